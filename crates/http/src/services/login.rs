//! Login against the primary network and every adjacent network

use super::federation::FederationMap;
use edgegate_core::{AuthOutcome, ProviderError, SecurityProvider};
use std::sync::Arc;

/// Authenticates credentials and populates the federation map
#[derive(Clone)]
pub struct LoginService {
    primary: Arc<dyn SecurityProvider>,
    adjacent: Arc<[Arc<dyn SecurityProvider>]>,
    federation: Arc<FederationMap>,
}

impl LoginService {
    pub fn new(
        primary: Arc<dyn SecurityProvider>,
        adjacent: Arc<[Arc<dyn SecurityProvider>]>,
        federation: Arc<FederationMap>,
    ) -> Self {
        Self {
            primary,
            adjacent,
            federation,
        }
    }

    /// Authenticate with the primary network, then try every adjacent one.
    ///
    /// Only the primary result decides success. Adjacent failures are
    /// expected for users that do not exist on that network and are only
    /// logged.
    pub async fn login(&self, user: &str, pass: &str) -> Result<AuthOutcome, ProviderError> {
        let outcome = self.primary.authenticate(user, pass).await?;
        info!(
            user,
            network = self.primary.network(),
            need_tfa = outcome.need_tfa,
            setup_tfa = outcome.setup_tfa,
            "login succeeded"
        );

        for (index, adjacent) in self.adjacent.iter().enumerate() {
            match adjacent.authenticate(user, pass).await {
                Ok(federated) => {
                    self.federation.record(&outcome.token, index, federated.token);
                    debug!(user, network = adjacent.network(), "federated login recorded");
                }
                Err(e) => {
                    debug!(user, network = adjacent.network(), "adjacent login failed: {e}");
                }
            }
        }

        Ok(outcome)
    }
}
