//! Legacy XML API trait

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Upload API operations. Responses are raw XML bytes.
#[async_trait]
pub trait XmlApi: Send + Sync {
    /// Every application profile (`4.0/getapplist.do`)
    async fn get_app_list(&self) -> Result<Vec<u8>>;

    /// Sandboxes of an application (`5.0/getsandboxlist.do`)
    async fn get_sandbox_list(&self, app_id: u64) -> Result<Vec<u8>>;

    /// Build info for the latest or a specific build (`5.0/getbuildinfo.do`)
    async fn get_build_info(
        &self,
        app_id: u64,
        build_id: Option<u64>,
        sandbox_id: Option<u64>,
    ) -> Result<Vec<u8>>;

    /// Upload a file to the current build (`5.0/uploadfile.do`)
    async fn upload_file(
        &self,
        app_id: u64,
        file: &Path,
        sandbox_id: Option<u64>,
        save_as: Option<&str>,
    ) -> Result<Vec<u8>>;
}
