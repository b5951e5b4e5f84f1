//! End-to-end scenarios against a real server on an OS-assigned port.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

use checkers_server::config::Config;
use checkers_server::server::{build_router, AppState};
use checkers_server::store::MemStore;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_server() -> Result<String> {
    let config = Config {
        inactivity_timeout_secs: 60,
        handshake_timeout_secs: 5,
        ..Config::default()
    };
    let state = AppState::new(config, Arc::new(MemStore::new()));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("server error: {e}");
        }
    });

    Ok(format!("ws://127.0.0.1:{}/ws", addr.port()))
}

async fn connect(url: &str) -> Result<WsStream> {
    let (stream, _) = tokio_tungstenite::connect_async(url).await?;
    Ok(stream)
}

async fn send_msg(ws: &mut WsStream, value: Value) -> Result<()> {
    ws.send(Message::Text(value.to_string())).await?;
    Ok(())
}

/// Next JSON envelope from the socket, or `None` on close.
async fn recv_msg(ws: &mut WsStream) -> Result<Option<Value>> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .map_err(|_| anyhow!("timed out waiting for a message"))?;
        match msg {
            Some(Ok(Message::Text(text))) => return Ok(Some(serde_json::from_str(&text)?)),
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// Skip forward to the next message of the given type.
async fn recv_of_type(ws: &mut WsStream, ty: &str) -> Result<Value> {
    loop {
        match recv_msg(ws).await? {
            Some(v) if v["type"] == ty => return Ok(v),
            Some(_) => continue,
            None => return Err(anyhow!("stream closed while waiting for {ty:?}")),
        }
    }
}

fn random_ply_index(state: &Value) -> usize {
    let len = state["data"]["plies"].as_array().map(|a| a.len()).unwrap_or(0);
    assert!(len > 0, "no legal plies in a non-terminal state");
    rand::rng().random_range(0..len)
}

// S1: create a machine game and play randomly until the game ends; versions
// must increase strictly and the stream must close after the terminal state.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn machine_game_plays_to_completion() -> Result<()> {
    let url = start_server().await?;
    let mut ws = connect(&url).await?;

    send_msg(
        &mut ws,
        json!({"type": "mach/new", "data": {
            "humanColor": "white", "heuristic": "WeightedCount", "timeLimitMs": 20
        }}),
    )
    .await?;

    let connected = recv_of_type(&mut ws, "mach/connected").await?;
    assert_eq!(connected["data"]["yourColor"], "white");

    let first = recv_of_type(&mut ws, "state").await?;
    assert_eq!(first["data"]["version"], 1);
    assert_eq!(first["data"]["toPlay"], "white");

    let mut last_version = 0u64;
    let mut state = first;
    let mut terminal_seen = false;
    for _ in 0..600 {
        let data = &state["data"];
        let version = data["version"].as_u64().unwrap();
        assert!(version > last_version, "versions must increase strictly");
        last_version = version;

        if data["result"] != "inProgress" {
            terminal_seen = true;
            break;
        }
        if data["toPlay"] == "white" {
            let index = random_ply_index(&state);
            send_msg(
                &mut ws,
                json!({"type": "ply", "data": {"version": version, "ply": index}}),
            )
            .await?;
        }
        state = recv_of_type(&mut ws, "state").await?;
    }
    assert!(terminal_seen, "game never finished");

    // After the terminal state the server closes the snapshot stream and
    // with it the session.
    loop {
        match recv_msg(&mut ws).await? {
            Some(v) => assert_ne!(v["type"], "state", "state after terminal"),
            None => break,
        }
    }
    Ok(())
}

// S2: reconnect to a machine game by id.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn machine_game_can_be_rejoined() -> Result<()> {
    let url = start_server().await?;
    let mut ws = connect(&url).await?;
    send_msg(
        &mut ws,
        json!({"type": "mach/new", "data": {
            "humanColor": "black", "heuristic": "PieceCount", "timeLimitMs": 20
        }}),
    )
    .await?;
    let connected = recv_of_type(&mut ws, "mach/connected").await?;
    let id = connected["data"]["id"].as_str().unwrap().to_string();
    drop(ws);

    // The machine (white) may already have moved; any current version is
    // acceptable on rejoin.
    let mut ws = connect(&url).await?;
    send_msg(&mut ws, json!({"type": "mach/connect", "data": {"id": id}})).await?;
    let connected = recv_of_type(&mut ws, "mach/connected").await?;
    assert_eq!(connected["data"]["yourColor"], "black");
    let state = recv_of_type(&mut ws, "state").await?;
    assert!(state["data"]["version"].as_u64().unwrap() >= 1);
    Ok(())
}

// S3: connecting to an unknown machine game reports an error.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_machine_game_is_an_error() -> Result<()> {
    let url = start_server().await?;
    let mut ws = connect(&url).await?;
    send_msg(
        &mut ws,
        json!({"type": "mach/connect", "data": {"id": uuid::Uuid::new_v4()}}),
    )
    .await?;
    let err = recv_of_type(&mut ws, "error").await?;
    let message = err["data"]["message"].as_str().unwrap();
    assert!(
        message.contains("machine game not found"),
        "unexpected error message: {message}"
    );
    Ok(())
}

// S4: two humans play each other; every version-N state observed by one
// equals the other's modulo yourColor. Includes S6 (stale version).
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn human_game_two_party_play() -> Result<()> {
    let url = start_server().await?;

    let mut white = connect(&url).await?;
    send_msg(&mut white, json!({"type": "human/new", "data": {"color": "white"}})).await?;
    let created = recv_of_type(&mut white, "human/created").await?;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let opponent_token = created["data"]["opponentToken"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["yourColor"], "white");
    let w1 = recv_of_type(&mut white, "state").await?;
    assert_eq!(w1["data"]["version"], 1);

    let mut black = connect(&url).await?;
    send_msg(
        &mut black,
        json!({"type": "human/connect", "data": {"id": id, "token": opponent_token}}),
    )
    .await?;
    let joined = recv_of_type(&mut black, "human/connected").await?;
    assert_eq!(joined["data"]["yourColor"], "black");
    let b1 = recv_of_type(&mut black, "state").await?;
    assert_eq!(b1["data"]["version"], 1);

    // White also learns that black came online.
    let status = recv_of_type(&mut white, "playerStatus").await?;
    assert_eq!(status["data"]["player"], "black");
    assert_eq!(status["data"]["online"], true);

    // S6: a stale submission is rejected and the session survives.
    send_msg(
        &mut white,
        json!({"type": "ply", "data": {"version": 0, "ply": 0}}),
    )
    .await?;
    let err = recv_of_type(&mut white, "error").await?;
    assert!(err["data"]["message"]
        .as_str()
        .unwrap()
        .contains("stale version"));

    // Alternate a few plies; check state equivalence modulo yourColor.
    let mut version = 1u64;
    for turn in 0..4 {
        let actor = if turn % 2 == 0 {
            &mut white
        } else {
            &mut black
        };
        send_msg(
            actor,
            json!({"type": "ply", "data": {"version": version, "ply": 0}}),
        )
        .await?;

        let sw = recv_of_type(&mut white, "state").await?;
        let sb = recv_of_type(&mut black, "state").await?;
        version += 1;
        assert_eq!(sw["data"]["version"], version);
        assert_eq!(sb["data"]["version"], version);
        for field in ["board", "toPlay", "result", "plies"] {
            assert_eq!(sw["data"][field], sb["data"][field], "mismatch in {field}");
        }
        assert_eq!(sw["data"]["yourColor"], "white");
        assert_eq!(sb["data"]["yourColor"], "black");
    }
    Ok(())
}

// S5: a wrong token is rejected but the handshake stays open for a retry.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invalid_token_is_rejected() -> Result<()> {
    let url = start_server().await?;

    let mut white = connect(&url).await?;
    send_msg(&mut white, json!({"type": "human/new", "data": {"color": "white"}})).await?;
    let created = recv_of_type(&mut white, "human/created").await?;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let opponent_token = created["data"]["opponentToken"].as_str().unwrap().to_string();

    let mut black = connect(&url).await?;
    let bogus = "00".repeat(36);
    send_msg(
        &mut black,
        json!({"type": "human/connect", "data": {"id": id, "token": bogus}}),
    )
    .await?;
    let err = recv_of_type(&mut black, "error").await?;
    assert!(err["data"]["message"].as_str().unwrap().contains("invalid token"));

    // Same connection, correct token: the handshake is still open.
    send_msg(
        &mut black,
        json!({"type": "human/connect", "data": {"id": id, "token": opponent_token}}),
    )
    .await?;
    let joined = recv_of_type(&mut black, "human/connected").await?;
    assert_eq!(joined["data"]["yourColor"], "black");
    Ok(())
}

// Presence: when the opponent disconnects, the remaining player hears about it.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opponent_disconnect_is_reported() -> Result<()> {
    let url = start_server().await?;

    let mut white = connect(&url).await?;
    send_msg(&mut white, json!({"type": "human/new", "data": {"color": "white"}})).await?;
    let created = recv_of_type(&mut white, "human/created").await?;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let opponent_token = created["data"]["opponentToken"].as_str().unwrap().to_string();

    let mut black = connect(&url).await?;
    send_msg(
        &mut black,
        json!({"type": "human/connect", "data": {"id": id, "token": opponent_token}}),
    )
    .await?;
    recv_of_type(&mut black, "human/connected").await?;

    let online = recv_of_type(&mut white, "playerStatus").await?;
    assert_eq!(online["data"]["online"], true);

    drop(black);
    let offline = recv_of_type(&mut white, "playerStatus").await?;
    assert_eq!(offline["data"]["player"], "black");
    assert_eq!(offline["data"]["online"], false);
    Ok(())
}
