use std::path::Path;

use async_trait::async_trait;
use mockall::mock;

use xsd_check::ResourceAccess;
use xsd_check::error::Result;

mock! {
    pub Resources {}

    #[async_trait]
    impl ResourceAccess for Resources {
        async fn read_local(&self, path: &Path) -> Result<Option<Vec<u8>>>;
        async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>>;
    }
}
