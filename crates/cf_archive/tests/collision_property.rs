//! Property coverage for the archiver's collision-naming invariant
//! (testable property #5 in spec.md §8: every archived file gets a
//! distinct name, pre-existing files are never overwritten).

use std::path::Path;

use cf_archive::{Archiver, Category};
use proptest::prelude::*;

fn write_sync(path: &Path, contents: &str) {
    std::fs::write(path, contents).unwrap();
}

proptest! {
    #[test]
    fn archiving_never_overwrites_an_existing_file(pre_existing_count in 0usize..8) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let root = tempfile::tempdir().unwrap();
            let processed = root.path().join("processed");
            std::fs::create_dir_all(&processed).unwrap();

            // Seed `pre_existing_count` colliding names: data.csv, data_1.csv, ...
            write_sync(&processed.join("data.csv"), "seed 0");
            for n in 1..pre_existing_count {
                write_sync(&processed.join(format!("data_{n}.csv")), "seed");
            }

            let input = root.path().join("data.csv");
            write_sync(&input, "a,b\n1,2\n");

            let archiver = Archiver::new(processed.clone(), root.path().join("failed"), None, false);
            let target = archiver.archive(&input, Category::Processed, None).await.unwrap();

            // The archived file must exist, the input must be gone, and every
            // pre-existing seed file must remain untouched at its original
            // contents (never overwritten by the move).
            prop_assert!(target.exists());
            prop_assert!(!input.exists());
            prop_assert_eq!(std::fs::read_to_string(&processed.join("data.csv")).unwrap(), "seed 0");
            for n in 1..pre_existing_count {
                prop_assert_eq!(
                    std::fs::read_to_string(processed.join(format!("data_{n}.csv"))).unwrap(),
                    "seed"
                );
            }
            Ok(())
        })?;
    }
}
