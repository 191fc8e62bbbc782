//! Block explorer lookups

use std::sync::Arc;

use tracing::{instrument, warn};

use cryptodash_core::{AddressBalance, Capability, FetchError, FetchResult, ProviderId};
use cryptodash_providers::{blockchair, etherscan};

use crate::cache::ResponseCache;
use crate::config::CacheTtls;
use crate::engine::{unsupported, Endpoint, FallbackEngine};

pub struct BlockchainService {
    engine: Arc<FallbackEngine>,
    cache: Arc<ResponseCache>,
    ttls: CacheTtls,
}

impl BlockchainService {
    pub fn new(engine: Arc<FallbackEngine>, cache: Arc<ResponseCache>, ttls: CacheTtls) -> Self {
        Self {
            engine,
            cache,
            ttls,
        }
    }

    /// Native-unit balance of `address`, `None` when no explorer answers
    #[instrument(skip(self))]
    pub async fn get_address_balance(
        &self,
        chain: &str,
        address: &str,
    ) -> Option<AddressBalance> {
        match self.try_address_balance(chain, address).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("[BlockchainService] No balance for {}/{}: {}", chain, address, e);
                None
            }
        }
    }

    pub async fn try_address_balance(
        &self,
        chain: &str,
        address: &str,
    ) -> FetchResult<AddressBalance> {
        let chain = chain.trim().to_lowercase();
        let address = address.trim().to_string();
        if address.is_empty() {
            return Err(FetchError::invalid_query("empty address"));
        }
        if blockchair::chain_decimals(&chain).is_none() {
            return Err(FetchError::invalid_query(format!("unsupported chain '{}'", chain)));
        }

        let key = format!("balance:{}:{}", chain, address);
        self.cache
            .get_or_fetch(&key, self.ttls.prices, || async {
                let endpoint = balance_endpoint(chain.clone(), address.clone());
                let sourced = self.engine.execute(Capability::Blockchain, &endpoint).await?;
                Ok::<_, FetchError>(sourced.value)
            })
            .await
    }
}

impl std::fmt::Debug for BlockchainService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainService").finish()
    }
}

fn balance_endpoint(chain: String, address: String) -> Endpoint<AddressBalance> {
    let (request_chain, request_address) = (chain.clone(), address.clone());
    Endpoint::new(
        "address-balance",
        move |provider| match provider.id {
            ProviderId::Etherscan => etherscan::balance_request(&request_chain, &request_address),
            ProviderId::Blockchair => {
                blockchair::address_request(&request_chain, &request_address)
            }
            _ => None,
        },
        move |provider, body| match provider.id {
            ProviderId::Etherscan => etherscan::parse_balance(body, &address, &provider.name),
            ProviderId::Blockchair => {
                blockchair::parse_address(body, &chain, &address, &provider.name)
            }
            other => Err(unsupported(other, "address balances")),
        },
    )
}
