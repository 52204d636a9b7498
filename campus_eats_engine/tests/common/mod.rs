#![allow(dead_code)]
//! Shared scaffolding for the engine integration tests: a throwaway migrated database, a seeded
//! lounge with a small menu, and a scriptable in-memory payment gateway.
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
    Mutex,
};

use campus_eats_engine::{
    db_types::{NewFoodItem, NewLounge, Principal, Role},
    order_objects::{CheckoutHandle, CheckoutRequest, PayerInfo},
    test_utils::{prepare_test_env, random_db_path},
    traits::{GatewayError, GatewayVerdict, PaymentGateway},
    CatalogManagement,
    SqliteDatabase,
};
use ce_common::Birr;

pub const LOUNGE_OWNER_ID: i64 = 200;

pub fn customer() -> Principal {
    Principal::new(100, Role::User)
}

pub fn other_customer() -> Principal {
    Principal::new(101, Role::User)
}

pub fn lounge_owner() -> Principal {
    Principal::new(LOUNGE_OWNER_ID, Role::Lounge)
}

pub fn admin() -> Principal {
    Principal::new(1, Role::Admin)
}

pub fn payer() -> PayerInfo {
    PayerInfo {
        email: "student@campus.example".to_string(),
        first_name: "Abel".to_string(),
        last_name: "Tesfaye".to_string(),
        phone: Some("+251911000000".to_string()),
    }
}

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

/// Seeds one lounge with a burger (50 ETB, 20 min) and a juice (15 ETB, 5 min). Returns
/// `(lounge_id, burger_id, juice_id)`.
pub async fn seed_menu(db: &SqliteDatabase) -> (i64, i64, i64) {
    let lounge = db
        .add_lounge(NewLounge { owner_id: LOUNGE_OWNER_ID, name: "Main Gate Lounge".to_string() })
        .await
        .expect("Error seeding lounge");
    let burger = db
        .add_food(NewFoodItem {
            lounge_id: lounge.id,
            name: "Beef Burger".to_string(),
            price: Birr::from_birr(50),
            estimated_time: 20,
            is_available: true,
        })
        .await
        .expect("Error seeding burger");
    let juice = db
        .add_food(NewFoodItem {
            lounge_id: lounge.id,
            name: "Avocado Juice".to_string(),
            price: Birr::from_birr(15),
            estimated_time: 5,
            is_available: true,
        })
        .await
        .expect("Error seeding juice");
    (lounge.id, burger.id, juice.id)
}

//--------------------------------------    Test gateway     ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestVerdict {
    Approve,
    Decline,
    Unreachable,
}

/// A scriptable gateway double. `initialize` always succeeds; `verify` answers with whatever
/// verdict the test has programmed and counts how often it was consulted.
#[derive(Clone)]
pub struct TestGateway {
    verdict: Arc<Mutex<TestVerdict>>,
    verify_calls: Arc<AtomicUsize>,
}

impl TestGateway {
    pub fn approving() -> Self {
        Self::with_verdict(TestVerdict::Approve)
    }

    pub fn with_verdict(verdict: TestVerdict) -> Self {
        Self { verdict: Arc::new(Mutex::new(verdict)), verify_calls: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn set_verdict(&self, verdict: TestVerdict) {
        *self.verdict.lock().unwrap() = verdict;
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

impl PaymentGateway for TestGateway {
    async fn initialize(&self, request: &CheckoutRequest) -> Result<CheckoutHandle, GatewayError> {
        Ok(CheckoutHandle {
            checkout_url: format!("https://checkout.gateway.test/{}", request.reference),
            reference: request.reference.clone(),
        })
    }

    async fn verify(&self, _reference: &str) -> Result<GatewayVerdict, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let verdict = *self.verdict.lock().unwrap();
        match verdict {
            TestVerdict::Approve => Ok(GatewayVerdict::Approved {
                tx_id: Some("TX-GW-1".to_string()),
                metadata: Some(r#"{"status":"success"}"#.to_string()),
            }),
            TestVerdict::Decline => Ok(GatewayVerdict::Declined { status: "failed".to_string() }),
            TestVerdict::Unreachable => Err(GatewayError::Unreachable("connection timed out".to_string())),
        }
    }
}
