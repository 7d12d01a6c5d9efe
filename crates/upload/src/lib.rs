pub mod math;
pub mod model;
pub mod plain_upload;
pub mod prepend_reader;
pub mod split_upload;
pub mod vault;

pub use model::{BalancerRepository, FileRepository, StorageRepository};
pub use plain_upload::PlainUpload;
pub use split_upload::SplitUpload;
pub use vault::Vault;
