#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use rust_decimal::Decimal;
use walletfeed::error::{ConfigError, FetchError};
use walletfeed::flow::{FlowProducer, ProducerFactory};
use walletfeed::models::{
    Balances, Network, ProviderModel, ProviderType, QuoteField, QuotePayload, QuotesResponse,
    RawCurrencyId,
};
use walletfeed::networks::AccountSource;
use walletfeed::providers::ProviderAsset;
use walletfeed::quotes::QuoteSource;

/// Decrements a live-producer counter when the producer's stream is dropped.
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// How producers created by [`CountingFactory`] behave.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// Emit the creation number, then stay open.
    Hold,
    /// Emit the creation number, then an error, then stay open.
    FailAfterFirst,
    /// Emit the creation number, then end.
    Finish,
}

/// Producer factory that counts creations and live producers.
pub struct CountingFactory {
    pub created: AtomicUsize,
    pub live: Arc<AtomicUsize>,
    fail_next: AtomicBool,
    script: Script,
}

impl CountingFactory {
    pub fn new(script: Script) -> Self {
        Self {
            created: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
            fail_next: AtomicBool::new(false),
            script,
        }
    }

    pub fn fail_next_creation(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

struct CountingProducer {
    number: usize,
    live: Arc<AtomicUsize>,
    script: Script,
}

impl FlowProducer<usize> for CountingProducer {
    fn produce(&self) -> BoxStream<'static, Result<usize, FetchError>> {
        self.live.fetch_add(1, Ordering::SeqCst);
        let guard = LiveGuard(self.live.clone());
        let first = stream::iter(vec![Ok(self.number)]);
        let items = match self.script {
            Script::Hold => first.chain(stream::pending()).boxed(),
            Script::FailAfterFirst => first
                .chain(stream::iter(vec![Err(FetchError::Transient("node down".into()))]))
                .chain(stream::pending())
                .boxed(),
            Script::Finish => first.boxed(),
        };
        items
            .map(move |item| {
                let _ = &guard;
                item
            })
            .boxed()
    }
}

impl ProducerFactory<String, usize> for CountingFactory {
    fn create(&self, _params: &String) -> Result<Box<dyn FlowProducer<usize>>, FetchError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(FetchError::InvalidArguments("rejected".into()));
        }
        let number = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(CountingProducer {
            number,
            live: self.live.clone(),
            script: self.script,
        }))
    }
}

/// Provider asset that counts reads.
pub struct CountingAsset {
    content: Mutex<String>,
    pub reads: Arc<AtomicUsize>,
}

impl CountingAsset {
    pub fn new(content: &str) -> Self {
        Self {
            content: Mutex::new(content.to_string()),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn replace(&self, content: &str) {
        *self.content.lock().unwrap() = content.to_string();
    }
}

impl ProviderAsset for CountingAsset {
    fn name(&self) -> String {
        "counting".to_string()
    }

    fn read(&self) -> Result<String, ConfigError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.content.lock().unwrap().clone())
    }
}

/// A provider document with one network and the given provider urls, in priority order.
pub fn providers_json(network: &str, urls: &[&str]) -> String {
    let providers: Vec<_> = urls
        .iter()
        .enumerate()
        .map(|(priority, url)| ProviderModel::new(*url, priority as u32, ProviderType::Public))
        .collect();
    serde_json::json!({
        "version": 1,
        "networks": { network: providers },
    })
    .to_string()
}

pub fn balances(asset: &str, amount: i64) -> Balances {
    Balances::from([(asset.to_string(), Decimal::new(amount, 0))])
}

/// What an account source does when called through a given provider url.
#[derive(Debug, Clone)]
pub enum Reply {
    Balances(Balances),
    Hang,
    Transient,
    NotFound,
    Malformed,
}

/// Account source scripted per provider url. Unscripted urls fail transiently.
#[derive(Default)]
pub struct ScriptedAccounts {
    replies: Mutex<HashMap<String, Reply>>,
    pub calls: Mutex<Vec<(String, String)>>,
    /// Hanging calls that were dropped before they returned.
    pub abandoned: AtomicUsize,
}

/// Counts a call as abandoned unless it is finished.
struct InFlight<'a> {
    abandoned: &'a AtomicUsize,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl ScriptedAccounts {
    pub fn reply(&self, url: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(url.to_string(), reply);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountSource for ScriptedAccounts {
    async fn fetch_balances(
        &self,
        provider: &ProviderModel,
        network: &Network,
        _public_key: &str,
    ) -> Result<Balances, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((network.id.to_string(), provider.url.clone()));
        let reply = self.replies.lock().unwrap().get(&provider.url).cloned();
        match reply {
            Some(Reply::Balances(balances)) => Ok(balances),
            Some(Reply::Hang) => {
                let mut call = InFlight {
                    abandoned: &self.abandoned,
                    finished: false,
                };
                tokio::time::sleep(Duration::from_secs(3600)).await;
                call.finished = true;
                Err(FetchError::Transient("woke up".into()))
            }
            Some(Reply::NotFound) => Err(FetchError::NotFound),
            Some(Reply::Malformed) => Err(FetchError::Data("unexpected payload".into())),
            Some(Reply::Transient) | None => {
                Err(FetchError::Transient("connection refused".into()))
            }
        }
    }
}

/// Quote source backed by a mutable table. Ids absent from the table are left out of
/// responses.
#[derive(Default)]
pub struct ScriptedQuotes {
    table: Mutex<HashMap<(String, RawCurrencyId), QuotePayload>>,
    failing: AtomicBool,
    pub calls: AtomicUsize,
}

impl ScriptedQuotes {
    /// Price `id` in usd.
    pub fn set(&self, id: &str, payload: QuotePayload) {
        self.set_in("usd", id, payload);
    }

    pub fn set_in(&self, fiat_currency: &str, id: &str, payload: QuotePayload) {
        self.table
            .lock()
            .unwrap()
            .insert((fiat_currency.to_string(), RawCurrencyId::new(id)), payload);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for ScriptedQuotes {
    async fn fetch_quotes(
        &self,
        fiat_currency: &str,
        currency_ids: &BTreeSet<RawCurrencyId>,
        _fields: &BTreeSet<QuoteField>,
    ) -> Result<QuotesResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Transient("price api unavailable".into()));
        }
        let table = self.table.lock().unwrap();
        Ok(QuotesResponse {
            quotes: currency_ids
                .iter()
                .filter_map(|id| {
                    table
                        .get(&(fiat_currency.to_string(), id.clone()))
                        .map(|payload| (id.clone(), payload.clone()))
                })
                .collect(),
        })
    }
}

pub fn price(amount: i64) -> QuotePayload {
    QuotePayload {
        price: Some(Decimal::new(amount, 0)),
        ..QuotePayload::default()
    }
}

pub fn ids(values: &[&str]) -> BTreeSet<RawCurrencyId> {
    values.iter().map(|v| RawCurrencyId::new(*v)).collect()
}
