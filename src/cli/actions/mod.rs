pub mod bootstrap;
pub mod server;

use anyhow::Result;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    BootstrapOwner(bootstrap::Args),
}

impl Action {
    /// Execute the action.
    ///
    /// # Errors
    /// Returns an error if the selected action fails.
    pub async fn execute(self) -> Result<()> {
        match self {
            Self::Server(args) => server::execute(args).await,
            Self::BootstrapOwner(args) => bootstrap::execute(args).await,
        }
    }
}
