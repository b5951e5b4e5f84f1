//! Per-connection session: handshake, then the ply pump.
//!
//! A session moves through Handshake -> Playing -> Closed. The handshake
//! phase reads messages until one of the four join/create messages lands
//! (lookup failures keep the phase open, anything malformed closes it) and
//! is bounded by a timeout. In Playing the socket is split: a writer task
//! owns the outgoing sink, consumer tasks forward snapshots and opponent
//! presence into it, and the main task pumps incoming ply submissions.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::Color;
use crate::protocol::{decode_client_msg, ClientMsg, GameStateMsg, ServerMsg};
use crate::search::Heuristic;
use crate::server::concurrent::{ConcurrentGame, GameState, SubscriptionId};
use crate::server::games::{HumanGame, MachineGame};
use crate::server::state::AppState;

const OUTGOING_BUFFER: usize = 64;

/// What the handshake resolved: which game, which role.
enum Seat {
    Human {
        hg: Arc<HumanGame>,
        color: Color,
        /// Report the opponent's current status once on entry; set when
        /// joining an existing game, where the opponent may already be
        /// there.
        announce_presence: bool,
    },
    Machine {
        mg: Arc<MachineGame>,
    },
}

impl Seat {
    fn game(&self) -> &ConcurrentGame {
        match self {
            Seat::Human { hg, .. } => &hg.game,
            Seat::Machine { mg } => &mg.game,
        }
    }

    fn color(&self) -> Color {
        match self {
            Seat::Human { color, .. } => *color,
            Seat::Machine { mg } => mg.human_color,
        }
    }
}

pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, mut incoming) = socket.split();
    let (out_tx, out_rx) = mpsc::channel::<ServerMsg>(OUTGOING_BUFFER);
    let writer = tokio::spawn(write_outgoing(sink, out_rx));

    let handshake_timeout = state.config.handshake_timeout();
    let seat = tokio::time::timeout(
        handshake_timeout,
        handshake(&mut incoming, &out_tx, &state),
    )
    .await;

    match seat {
        Ok(Some(seat)) => play(seat, &mut incoming, &out_tx).await,
        Ok(None) => {}
        Err(_) => {
            tracing::debug!("handshake timed out");
        }
    }

    drop(out_tx);
    let _ = writer.await;
}

async fn write_outgoing(
    mut sink: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<ServerMsg>,
) {
    while let Some(msg) = out_rx.recv().await {
        match serde_json::to_string(&msg) {
            Ok(text) => {
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize outgoing message");
            }
        }
    }
    let _ = sink.close().await;
}

async fn send(out_tx: &mpsc::Sender<ServerMsg>, msg: ServerMsg) {
    let _ = out_tx.send(msg).await;
}

/// Run the Handshake phase. Returns `None` when the session should close
/// without entering Playing.
async fn handshake(
    incoming: &mut (impl Stream<Item = Result<Message, axum::Error>> + Unpin),
    out_tx: &mpsc::Sender<ServerMsg>,
    state: &AppState,
) -> Option<Seat> {
    loop {
        let text = match incoming.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => continue,
        };

        let msg = match decode_client_msg(&text) {
            Ok(msg) => msg,
            Err(e) => {
                send(out_tx, ServerMsg::error(e.to_string())).await;
                return None;
            }
        };

        match msg {
            ClientMsg::MachNew {
                human_color,
                heuristic,
                time_limit_ms,
            } => {
                return start_machine_game(out_tx, state, human_color, &heuristic, time_limit_ms)
                    .await;
            }
            ClientMsg::MachConnect { id } => match state.machine_hub.get(id) {
                Some(mg) => {
                    send(
                        out_tx,
                        ServerMsg::MachConnected {
                            id: mg.id,
                            your_color: mg.human_color,
                        },
                    )
                    .await;
                    return Some(Seat::Machine { mg });
                }
                None => {
                    send(
                        out_tx,
                        ServerMsg::error(format!("machine game not found: {id}")),
                    )
                    .await;
                }
            },
            ClientMsg::HumanNew { color } => {
                let hg = match HumanGame::new() {
                    Ok(hg) => Arc::new(hg),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to create human game");
                        send(out_tx, ServerMsg::error("internal error creating game")).await;
                        return None;
                    }
                };
                state.human_hub.register(hg.clone());
                send(
                    out_tx,
                    ServerMsg::HumanCreated {
                        id: hg.id,
                        your_color: color,
                        your_token: hg.token(color).as_str().to_string(),
                        opponent_token: hg.token(color.opposite()).as_str().to_string(),
                    },
                )
                .await;
                return Some(Seat::Human {
                    hg,
                    color,
                    announce_presence: false,
                });
            }
            ClientMsg::HumanConnect { id, token } => match state.human_hub.get(id) {
                Some(hg) => match hg.authenticate(&token) {
                    Some(color) => {
                        send(
                            out_tx,
                            ServerMsg::HumanConnected {
                                id: hg.id,
                                your_color: color,
                                your_token: hg.token(color).as_str().to_string(),
                            },
                        )
                        .await;
                        return Some(Seat::Human {
                            hg,
                            color,
                            announce_presence: true,
                        });
                    }
                    None => {
                        send(out_tx, ServerMsg::error("invalid token")).await;
                    }
                },
                None => {
                    send(out_tx, ServerMsg::error(format!("game not found: {id}"))).await;
                }
            },
            ClientMsg::Ply { .. } => {
                send(
                    out_tx,
                    ServerMsg::error("unexpected message type before joining a game"),
                )
                .await;
                return None;
            }
        }
    }
}

async fn start_machine_game(
    out_tx: &mpsc::Sender<ServerMsg>,
    state: &AppState,
    human_color: Color,
    heuristic: &str,
    time_limit_ms: u64,
) -> Option<Seat> {
    let Some(heuristic) = Heuristic::from_name(heuristic) else {
        send(out_tx, ServerMsg::error(format!("unknown heuristic {heuristic:?}"))).await;
        return None;
    };
    if time_limit_ms == 0 {
        send(out_tx, ServerMsg::error("non-positive time limit")).await;
        return None;
    }
    let time_limit = Duration::from_millis(time_limit_ms.min(state.config.max_search_ms));

    let mg = Arc::new(MachineGame::new(human_color, heuristic, time_limit));
    send(
        out_tx,
        ServerMsg::MachConnected {
            id: mg.id,
            your_color: human_color,
        },
    )
    .await;
    // Register after the acknowledgement is queued: registering may make
    // the machine move immediately, and the role ack must come first.
    state.machine_hub.register(mg.clone());
    Some(Seat::Machine { mg })
}

/// The Playing phase. Returns when the incoming stream closes or the game's
/// snapshot stream delivered its terminal snapshot.
async fn play(
    seat: Seat,
    incoming: &mut (impl Stream<Item = Result<Message, axum::Error>> + Unpin),
    out_tx: &mpsc::Sender<ServerMsg>,
) {
    let color = seat.color();
    let game = seat.game();

    // Subscribe before reading the snapshot so nothing falls in between;
    // the consumer drops anything at or below the version sent here.
    let (game_sub, game_rx) = game.subscribe();
    let initial = game.snapshot();
    let initial_version = initial.version;
    let initial_terminal = initial.result.is_terminal();
    send(out_tx, state_msg(&initial, color)).await;

    let mut consumer = tokio::spawn(consume_snapshots(
        game_rx,
        out_tx.clone(),
        color,
        initial_version,
    ));

    // Humans also watch the opposite role.
    let presence_parts: Option<(SubscriptionId, JoinHandle<()>)> = match &seat {
        Seat::Human {
            hg,
            color,
            announce_presence,
        } => {
            let opponent = color.opposite();
            let (presence_sub, presence_rx) = hg.presence(opponent).subscribe();
            if *announce_presence {
                send(
                    out_tx,
                    ServerMsg::PlayerStatus {
                        player: opponent,
                        online: hg.presence(opponent).is_online(),
                    },
                )
                .await;
            }
            let presence_consumer =
                tokio::spawn(consume_presence(presence_rx, out_tx.clone(), opponent));
            hg.presence(*color).enter();
            Some((presence_sub, presence_consumer))
        }
        Seat::Machine { mg } => {
            mg.presence.enter();
            None
        }
    };

    if !initial_terminal {
        ply_pump(incoming, out_tx, game, color, &mut consumer).await;
    }

    // Teardown order: game subscription first, then opposite presence,
    // then release our own presence.
    game.detach(game_sub);
    consumer.abort();
    match &seat {
        Seat::Human { hg, color, .. } => {
            if let Some((presence_sub, presence_consumer)) = presence_parts {
                hg.presence(color.opposite()).detach(presence_sub);
                presence_consumer.abort();
            }
            hg.presence(*color).exit();
        }
        Seat::Machine { mg } => {
            mg.presence.exit();
        }
    }
}

async fn ply_pump(
    incoming: &mut (impl Stream<Item = Result<Message, axum::Error>> + Unpin),
    out_tx: &mpsc::Sender<ServerMsg>,
    game: &ConcurrentGame,
    color: Color,
    consumer: &mut JoinHandle<()>,
) {
    loop {
        tokio::select! {
            // The snapshot consumer finishing means the terminal snapshot
            // has been forwarded (or the stream was torn down); close.
            _ = &mut *consumer => break,

            msg = incoming.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                match decode_client_msg(&text) {
                    Ok(ClientMsg::Ply { version, index }) => {
                        if let Err(e) = game.apply_indexed(color, version, index) {
                            send(out_tx, ServerMsg::error(e.to_string())).await;
                        }
                    }
                    Ok(_) => {
                        send(out_tx, ServerMsg::error("unexpected message type")).await;
                    }
                    Err(e) => {
                        send(out_tx, ServerMsg::error(e.to_string())).await;
                    }
                }
            }
        }
    }
}

/// Forward snapshots above `last_version` to the peer, in order, ending
/// after the terminal one.
async fn consume_snapshots(
    mut rx: mpsc::Receiver<GameState>,
    out_tx: mpsc::Sender<ServerMsg>,
    color: Color,
    mut last_version: u32,
) {
    while let Some(snapshot) = rx.recv().await {
        if snapshot.version <= last_version {
            continue;
        }
        last_version = snapshot.version;
        let terminal = snapshot.result.is_terminal();
        if out_tx.send(state_msg(&snapshot, color)).await.is_err() {
            break;
        }
        if terminal {
            break;
        }
    }
}

async fn consume_presence(
    mut rx: mpsc::Receiver<bool>,
    out_tx: mpsc::Sender<ServerMsg>,
    opponent: Color,
) {
    while let Some(online) = rx.recv().await {
        let msg = ServerMsg::PlayerStatus {
            player: opponent,
            online,
        };
        if out_tx.send(msg).await.is_err() {
            break;
        }
    }
}

fn state_msg(snapshot: &GameState, your_color: Color) -> ServerMsg {
    ServerMsg::State(GameStateMsg {
        version: snapshot.version,
        board: snapshot.board.serialize(),
        to_play: snapshot.to_play,
        result: snapshot.result,
        plies: snapshot.legal_plies.to_vec(),
        your_color,
    })
}
