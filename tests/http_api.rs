#![allow(non_snake_case)]

use actix_web::{
    App,
    HttpRequest,
    HttpResponse,
    HttpServer,
    dev::ServerHandle,
    web,
};
use alloy_primitives::{
    Address,
    Signature,
};
use clawsvegas::{
    arcade_client::{
        HttpArcadeApi,
        LobbyApi,
        SIGNATURE_HEADER,
        TIMESTAMP_HEADER,
        WALLET_ADDRESS_HEADER,
    },
    bet::RandomSeeds,
    config::Config,
    error::{
        ArcadeError,
        TransportErrorKind,
    },
    session::{
        BetState,
        GaslessTable,
    },
    signer::LocalSigner,
    test_helpers::permit_descriptor,
};
use serde_json::{
    Value,
    json,
};
use std::{
    net::TcpListener,
    str::FromStr,
    sync::Mutex,
    thread::JoinHandle,
};

#[derive(Clone, Debug)]
struct Recorded {
    method: String,
    path: String,
    wallet: Option<String>,
    timestamp: Option<String>,
    signature: Option<String>,
    body: Value,
}

#[derive(Default)]
struct MockState {
    requests: Mutex<Vec<Recorded>>,
}

struct MockArcade {
    base_url: String,
    state: web::Data<MockState>,
    server_handle: ServerHandle,
    server_thread: Option<JoinHandle<()>>,
}

impl MockArcade {
    async fn start() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let address = listener.local_addr().unwrap();
        let state = web::Data::new(MockState::default());

        let server_state = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(server_state.clone())
                .default_service(web::to(handle))
        })
        .workers(1)
        .listen(listener)
        .unwrap()
        .run();

        let server_handle = server.handle();
        let server_thread = std::thread::spawn(move || {
            let sys = actix_web::rt::System::new();
            let _ = sys.block_on(server);
        });

        Self {
            base_url: format!("http://{address}"),
            state,
            server_handle,
            server_thread: Some(server_thread),
        }
    }

    fn config(&self) -> Config {
        Config {
            api_base: self.base_url.clone(),
            request_timeout_secs: 5,
            ..Config::default()
        }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

impl Drop for MockArcade {
    fn drop(&mut self) {
        let _ = self.server_handle.stop(false);
        if let Some(thread) = self.server_thread.take() {
            let _ = thread.join();
        }
    }
}

async fn handle(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<MockState>,
) -> HttpResponse {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let path = req.path().to_string();
    state.requests.lock().unwrap().push(Recorded {
        method: req.method().to_string(),
        path: path.clone(),
        wallet: header(WALLET_ADDRESS_HEADER),
        timestamp: header(TIMESTAMP_HEADER),
        signature: header(SIGNATURE_HEADER),
        body: body.clone(),
    });

    match (req.method().as_str(), path.as_str()) {
        ("POST", "/v3/wallet/deposit/prepare") => {
            if body["amount"].as_f64().unwrap_or_default() > 50.0 {
                return HttpResponse::BadRequest().json(json!({
                    "success": false,
                    "error": "Insufficient USDC balance: have 50, need more"
                }));
            }
            let descriptor =
                permit_descriptor(json!("5000000"), json!("99999999999"));
            HttpResponse::Ok().json(json!({ "success": true, "data": descriptor }))
        }
        ("POST", "/v3/game/play-gasless") => HttpResponse::Ok().json(json!({
            "success": true,
            "data": {
                "won": true,
                "outcomeText": "HEADS",
                "payout": 9.8,
                "gameId": "abc123",
                "txHash": "0xfeed"
            }
        })),
        ("GET", "/v3/wallet/balance") => {
            HttpResponse::Ok().json(json!({ "success": true, "data": { "balance": 12.5 } }))
        }
        ("GET", "/v3/arcade/agents") => HttpResponse::Ok().json(json!({
            "success": true,
            "data": { "agents": [{ "name": "Alice" }, { "name": "Bob" }] }
        })),
        ("POST", "/v3/arcade/leave") => {
            HttpResponse::ServiceUnavailable().body("arcade under maintenance")
        }
        ("POST", _) => HttpResponse::Ok().json(json!({ "success": true })),
        _ => HttpResponse::NotFound().finish(),
    }
}

fn client(config: Config, signer: Option<LocalSigner>) -> HttpArcadeApi<LocalSigner> {
    let wallet = signer
        .as_ref()
        .map(|s| s.address())
        .unwrap_or(Address::repeat_byte(0x42));
    HttpArcadeApi::new(&config, Some(wallet), signer).unwrap()
}

#[tokio::test]
async fn play__signs_permit_locally_and_resolves_win() {
    // given
    let arcade = MockArcade::start().await;
    let signer = LocalSigner::random();
    let wallet = signer.address();
    let private_key = signer.private_key_hex();
    let api = client(arcade.config(), Some(signer));
    let table = GaslessTable::new(&api, api.signer(), arcade.config().policy(), wallet);

    // when
    let report = table.play("5", "heads", &RandomSeeds).await;

    // then
    let outcome = report.result.as_ref().unwrap();
    assert!(outcome.won);
    assert_eq!(outcome.payout, Some(9.8));
    assert_eq!(outcome.game_id.as_deref(), Some("abc123"));
    assert_eq!(outcome.tx_hash.as_deref(), Some("0xfeed"));
    assert_eq!(report.session.state(), BetState::Resolved);

    let prepare = arcade.requests_to("/v3/wallet/deposit/prepare");
    assert_eq!(prepare.len(), 1);
    assert_eq!(prepare[0].body["amount"], json!(5.0));
    assert_eq!(prepare[0].body["walletAddress"], json!(wallet.to_string()));

    let play = arcade.requests_to("/v3/game/play-gasless");
    assert_eq!(play.len(), 1);
    let body = &play[0].body;
    assert_eq!(body["choice"], json!(0));
    assert!(body["clientSeed"].as_str().unwrap().starts_with("flip-"));
    assert_eq!(body["permit"]["owner"], json!(wallet.to_string()));
    assert_eq!(body["permit"]["value"], json!("5000000"));
    assert_eq!(body["permit"]["deadline"], json!("99999999999"));
    assert!(body["permit"]["v"] == json!(27) || body["permit"]["v"] == json!(28));

    let key_material = private_key.trim_start_matches("0x");
    for request in arcade.requests() {
        assert!(!request.body.to_string().contains(key_material));
    }
}

#[tokio::test]
async fn requests__carry_recoverable_auth_signature() {
    // given
    let arcade = MockArcade::start().await;
    let signer = LocalSigner::random();
    let wallet = signer.address();
    let api = client(arcade.config(), Some(signer));

    // when
    let balance = api.balance().await.unwrap().into_result().unwrap();

    // then
    assert_eq!(balance.balance, 12.5);
    let request = &arcade.requests_to("/v3/wallet/balance")[0];
    assert_eq!(request.method, "GET");
    let header_wallet = request.wallet.clone().unwrap();
    assert_eq!(Address::from_str(&header_wallet).unwrap(), wallet);
    let timestamp = request.timestamp.clone().unwrap();
    assert!(timestamp.parse::<i64>().is_ok());
    let signature = request.signature.clone().unwrap();
    let bytes = hex::decode(signature.trim_start_matches("0x")).unwrap();
    let message = format!("ClawsVegas:{header_wallet}:{timestamp}");
    let recovered = Signature::from_raw(&bytes)
        .unwrap()
        .recover_address_from_msg(message.as_bytes())
        .unwrap();
    assert_eq!(recovered, wallet);
}

#[tokio::test]
async fn play__insufficient_balance_never_reaches_submit() {
    // given
    let arcade = MockArcade::start().await;
    let signer = LocalSigner::random();
    let wallet = signer.address();
    let api = client(arcade.config(), Some(signer));
    let table = GaslessTable::new(&api, api.signer(), arcade.config().policy(), wallet);

    // when
    let report = table.play("75", "tails", &RandomSeeds).await;

    // then
    assert!(matches!(
        report.result,
        Err(ArcadeError::InsufficientFunds { .. })
    ));
    assert_eq!(report.session.state(), BetState::Rejected);
    assert!(arcade.requests_to("/v3/game/play-gasless").is_empty());
}

#[tokio::test]
async fn play__out_of_bounds_amount_sends_nothing() {
    // given
    let arcade = MockArcade::start().await;
    let signer = LocalSigner::random();
    let wallet = signer.address();
    let api = client(arcade.config(), Some(signer));
    let table = GaslessTable::new(&api, api.signer(), arcade.config().policy(), wallet);

    // when
    let report = table.play("150", "heads", &RandomSeeds).await;

    // then
    assert!(matches!(report.result, Err(ArcadeError::Policy(_))));
    assert!(arcade.requests().is_empty());
}

#[tokio::test]
async fn requests__degrade_to_unsigned_without_signer() {
    // given
    let arcade = MockArcade::start().await;
    let api = client(arcade.config(), None);

    // when
    let agents = api.agents().await.unwrap().into_result().unwrap();

    // then
    let names: Vec<_> = agents.agents.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Bob"]);
    let request = &arcade.requests_to("/v3/arcade/agents")[0];
    assert!(request.wallet.is_some());
    assert!(request.timestamp.is_some());
    assert!(request.signature.is_none());
}

#[tokio::test]
async fn requests__refused_locally_when_signatures_are_required() {
    // given
    let arcade = MockArcade::start().await;
    let config = Config {
        require_signed_requests: true,
        ..arcade.config()
    };
    let api = client(config, None);

    // when
    let result = api.balance().await;

    // then
    assert!(matches!(result, Err(ArcadeError::CapabilityUnavailable(_))));
    assert!(arcade.requests().is_empty());
}

#[tokio::test]
async fn lobby__sends_expected_bodies() {
    // given
    let arcade = MockArcade::start().await;
    let api = client(arcade.config(), Some(LocalSigner::random()));

    // when
    api.enter("MyBot").await.unwrap().into_ack().unwrap();
    api.chat("Feeling lucky").await.unwrap().into_ack().unwrap();
    api.move_to(120, 80).await.unwrap().into_ack().unwrap();

    // then
    assert_eq!(
        arcade.requests_to("/v3/arcade/enter")[0].body,
        json!({ "name": "MyBot" })
    );
    assert_eq!(
        arcade.requests_to("/v3/arcade/chat")[0].body,
        json!({ "message": "Feeling lucky" })
    );
    assert_eq!(
        arcade.requests_to("/v3/arcade/move")[0].body,
        json!({ "x": 120, "y": 80 })
    );
}

#[tokio::test]
async fn lobby__non_json_error_status_is_transport_error() {
    // given
    let arcade = MockArcade::start().await;
    let api = client(arcade.config(), Some(LocalSigner::random()));

    // when
    let result = api.leave().await;

    // then
    match result {
        Err(ArcadeError::Transport(err)) => {
            assert_eq!(err.kind, TransportErrorKind::Status(503));
            assert!(err.message.contains("maintenance"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn requests__unreachable_arcade_is_transport_error() {
    // given
    let port = {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = Config {
        api_base: format!("http://127.0.0.1:{port}"),
        request_timeout_secs: 2,
        ..Config::default()
    };
    let api: HttpArcadeApi<LocalSigner> =
        HttpArcadeApi::new(&config, Some(Address::repeat_byte(1)), None).unwrap();

    // when
    let result = api.balance().await;

    // then
    let err = result.unwrap_err();
    assert!(err.is_indeterminate());
    assert!(matches!(err, ArcadeError::Transport(_)));
}
