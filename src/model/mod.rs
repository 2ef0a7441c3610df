mod commit;
mod fragment;
mod version;

pub use commit::{ChangeKind, Commit, CommitId, PathChange};
pub use fragment::{Fragment, FragmentKey, ScanResult, VersionNotes};
pub use version::{split_runs, KeyPart, OrderKey, Version};
