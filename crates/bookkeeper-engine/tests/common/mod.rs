//! Shared harness for the engine integration tests.
//!
//! One bookkeeper with every reference plugin registered, three funded
//! actors, and a WETH-against-USDC lending offer from the lender.

#![allow(dead_code)]

use bookkeeper_blueprint::BlueprintSigner;
use bookkeeper_engine::Bookkeeper;
use bookkeeper_plugins::{
    FeedOracle, SoloAccount, SoloAccountParams, StandardAssessor, StandardAssessorParams,
    StandardLiquidator, StandardLiquidatorParams, StaticOracle, StaticOracleParams, WalletFactory,
};
use bookkeeper_types::*;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::SigningKey;
use rust_decimal::Decimal;

pub fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Actor {
    pub signer: BlueprintSigner,
    pub addr: Address,
    pub account: PluginReference,
}

impl Actor {
    fn new(account_plugin: Address, salt: u64) -> Self {
        let signer = BlueprintSigner::new(SigningKey::generate(&mut rand::rngs::OsRng));
        let addr = signer.publisher();
        let account =
            PluginReference::with_params(account_plugin, &SoloAccountParams::new(addr, salt))
                .unwrap();
        Self {
            signer,
            addr,
            account,
        }
    }
}

pub struct World {
    pub bk: Bookkeeper,
    pub now: DateTime<Utc>,
    pub lender: Actor,
    pub borrower: Actor,
    pub keeper: Actor,
    pub account_plugin: Address,
    /// Feed oracle pricing WETH.
    pub feed: Address,
    /// Static oracle pricing USDC at 1.
    pub usdc_oracle: PluginReference,
    pub assessor: Address,
    pub liquidator: Address,
    pub factory: Address,
}

pub const LENDER_WETH: i64 = 10;
pub const BORROWER_USDC: i64 = 10_000;

impl World {
    pub fn new() -> Self {
        init_tracing();
        let mut bk = Bookkeeper::new(BookkeeperConfig::default()).unwrap();
        let now = Utc::now();

        let registry = bk.registry_mut();
        let account_plugin = registry
            .register_account(SoloAccount::new(Address::derive("account:solo")))
            .unwrap();
        let feed = registry
            .register_oracle(FeedOracle::new(Address::derive("oracle:feed")))
            .unwrap();
        let static_oracle = registry
            .register_oracle(StaticOracle::new(Address::derive("oracle:static")))
            .unwrap();
        let assessor = registry
            .register_assessor(StandardAssessor::new(Address::derive("assessor:standard")))
            .unwrap();
        let liquidator = registry
            .register_liquidator(StandardLiquidator::new(Address::derive(
                "liquidator:standard",
            )))
            .unwrap();
        let factory = registry
            .register_position_factory(WalletFactory::new(Address::derive("factory:wallet")))
            .unwrap();
        registry
            .feed_oracle_mut(&feed)
            .unwrap()
            .set_price("WETH", dec(2000), now)
            .unwrap();

        let usdc_oracle =
            PluginReference::with_params(static_oracle, &StaticOracleParams { price: dec(1) })
                .unwrap();

        let lender = Actor::new(account_plugin, 0);
        let borrower = Actor::new(account_plugin, 0);
        let keeper = Actor::new(account_plugin, 0);
        bk.load_from_user(&lender.account, "WETH", dec(LENDER_WETH))
            .unwrap();
        bk.load_from_user(&borrower.account, "USDC", dec(BORROWER_USDC))
            .unwrap();

        Self {
            bk,
            now,
            lender,
            borrower,
            keeper,
            account_plugin,
            feed,
            usdc_oracle,
            assessor,
            liquidator,
            factory,
        }
    }

    /// A second funded borrower.
    pub fn funded_borrower(&mut self, salt: u64) -> Actor {
        let actor = Actor::new(self.account_plugin, salt);
        self.bk
            .load_from_user(&actor.account, "USDC", dec(BORROWER_USDC))
            .unwrap();
        actor
    }

    pub fn free_assessor(&self) -> PluginReference {
        PluginReference::new(self.assessor, Vec::new())
    }

    pub fn interest_assessor(&self, rate: Decimal) -> PluginReference {
        PluginReference::with_params(
            self.assessor,
            &StandardAssessorParams {
                interest_rate: rate,
                ..Default::default()
            },
        )
        .unwrap()
    }

    pub fn liquidator_ref(&self, reward_ratio: Decimal) -> PluginReference {
        PluginReference::with_params(self.liquidator, &StandardLiquidatorParams { reward_ratio })
            .unwrap()
    }

    /// The lender's WETH offer against USDC at a 1.5 minimum ratio.
    pub fn offer(&self) -> Order {
        Order::dummy_offer(
            self.lender.account.clone(),
            PluginReference::new(self.feed, Vec::new()),
            self.usdc_oracle.clone(),
            self.free_assessor(),
            self.liquidator_ref(Decimal::new(5, 2)),
            self.factory,
        )
    }

    pub fn sign(&self, publisher: &Actor, order: &Order, max_nonce: u64) -> SignedBlueprint {
        publisher
            .signer
            .sign_order(
                self.bk.authority().domain(),
                order,
                max_nonce,
                self.now - Duration::hours(1),
                self.now + Duration::hours(1),
            )
            .unwrap()
    }

    /// A borrower's fill posting `collateral` USDC for `loan` WETH.
    pub fn fill_with_amount(&self, filler: &Actor, loan: Decimal, collateral: Decimal) -> Fill {
        Fill {
            account: filler.account.clone(),
            loan_amount: loan,
            taker_idx: 0,
            loan_asset_idx: 0,
            coll_asset_idx: 0,
            factory_idx: 0,
            is_offer_fill: true,
            borrower_config: BorrowerConfig::with_amount(collateral),
            filler_data: Vec::new(),
        }
    }

    pub fn balance(&self, actor: &Actor, asset: &str) -> Decimal {
        self.bk.registry().balance(&actor.account, asset).unwrap()
    }

    pub fn set_weth_price(&mut self, price: Decimal) {
        let now = self.now;
        self.bk
            .registry_mut()
            .feed_oracle_mut(&self.feed)
            .unwrap()
            .set_price("WETH", price, now)
            .unwrap();
    }
}
