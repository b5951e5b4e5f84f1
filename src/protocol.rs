//! Client-server messaging protocol.
//!
//! Every message travels in a `{"type": ..., "data": ...}` envelope; the
//! tagged enums below are that envelope. Bodies use camelCase field names.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{Color, GameResult, Ply};

/// Messages a client can send to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMsg {
    /// Create a game against the machine and take the given color.
    #[serde(rename = "mach/new", rename_all = "camelCase")]
    MachNew {
        human_color: Color,
        heuristic: String,
        time_limit_ms: u64,
    },
    /// Rejoin an existing machine game.
    #[serde(rename = "mach/connect")]
    MachConnect { id: Uuid },
    /// Create a two-player game and take the given color.
    #[serde(rename = "human/new")]
    HumanNew { color: Color },
    /// Join a two-player game; the token determines the color.
    #[serde(rename = "human/connect")]
    HumanConnect { id: Uuid, token: String },
    /// Submit the ply at `ply` (an index into the current legal plies)
    /// against the given state version.
    #[serde(rename = "ply")]
    Ply {
        version: u32,
        #[serde(rename = "ply")]
        index: usize,
    },
}

/// Messages the server sends to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMsg {
    #[serde(rename = "mach/connected", rename_all = "camelCase")]
    MachConnected { id: Uuid, your_color: Color },
    #[serde(rename = "human/created", rename_all = "camelCase")]
    HumanCreated {
        id: Uuid,
        your_color: Color,
        your_token: String,
        opponent_token: String,
    },
    #[serde(rename = "human/connected", rename_all = "camelCase")]
    HumanConnected {
        id: Uuid,
        your_color: Color,
        your_token: String,
    },
    #[serde(rename = "state")]
    State(GameStateMsg),
    #[serde(rename = "playerStatus")]
    PlayerStatus { player: Color, online: bool },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMsg {
    pub fn error(message: impl Into<String>) -> ServerMsg {
        ServerMsg::Error {
            message: message.into(),
        }
    }
}

/// Why an incoming message failed to decode.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed message envelope")]
    MalformedEnvelope,
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("invalid message data: {0}")]
    BadData(String),
}

const KNOWN_TAGS: [&str; 5] = ["mach/new", "mach/connect", "human/new", "human/connect", "ply"];

/// Decode an incoming envelope, separating "not an envelope at all" from
/// "unknown tag" from "known tag, bad body".
pub fn decode_client_msg(text: &str) -> Result<ClientMsg, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| DecodeError::MalformedEnvelope)?;
    let Some(tag) = value.get("type").and_then(|t| t.as_str()) else {
        return Err(DecodeError::MalformedEnvelope);
    };
    if !KNOWN_TAGS.contains(&tag) {
        return Err(DecodeError::UnknownType(tag.to_string()));
    }
    serde_json::from_value(value).map_err(|e| DecodeError::BadData(e.to_string()))
}

/// One authoritative game snapshot as seen by one role.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateMsg {
    pub version: u32,
    pub board: String,
    pub to_play: Color,
    pub result: GameResult,
    pub plies: Vec<Ply>,
    pub your_color: Color,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_envelopes_parse() {
        let msg: ClientMsg = serde_json::from_value(json!({
            "type": "mach/new",
            "data": {"humanColor": "white", "heuristic": "WeightedCount", "timeLimitMs": 100}
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMsg::MachNew {
                human_color: Color::White,
                heuristic: "WeightedCount".into(),
                time_limit_ms: 100
            }
        );

        let msg: ClientMsg = serde_json::from_value(json!({
            "type": "ply",
            "data": {"version": 3, "ply": 2}
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMsg::Ply {
                version: 3,
                index: 2
            }
        );
    }

    #[test]
    fn decode_distinguishes_the_failure_modes() {
        assert_eq!(
            decode_client_msg("not json"),
            Err(DecodeError::MalformedEnvelope)
        );
        assert_eq!(
            decode_client_msg(r#"{"data": {}}"#),
            Err(DecodeError::MalformedEnvelope)
        );
        assert_eq!(
            decode_client_msg(r#"{"type": "chat", "data": {"text": "hi"}}"#),
            Err(DecodeError::UnknownType("chat".into()))
        );
        assert!(matches!(
            decode_client_msg(r#"{"type": "ply", "data": {"version": 1}}"#),
            Err(DecodeError::BadData(_))
        ));
        assert!(decode_client_msg(
            r#"{"type": "human/new", "data": {"color": "black"}}"#
        )
        .is_ok());
    }

    #[test]
    fn server_envelopes_serialize_with_camel_case_bodies() {
        let id = Uuid::nil();
        let value = serde_json::to_value(ServerMsg::HumanCreated {
            id,
            your_color: Color::Black,
            your_token: "aa".into(),
            opponent_token: "bb".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({
                "type": "human/created",
                "data": {
                    "id": "00000000-0000-0000-0000-000000000000",
                    "yourColor": "black",
                    "yourToken": "aa",
                    "opponentToken": "bb"
                }
            })
        );

        let value = serde_json::to_value(ServerMsg::PlayerStatus {
            player: Color::White,
            online: true,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "playerStatus", "data": {"player": "white", "online": true}})
        );
    }

    #[test]
    fn state_body_has_the_documented_shape() {
        let state = GameStateMsg {
            version: 1,
            board: crate::engine::Board::initial().serialize(),
            to_play: Color::White,
            result: GameResult::InProgress,
            plies: vec![],
            your_color: Color::White,
        };
        let value = serde_json::to_value(ServerMsg::State(state)).unwrap();
        assert_eq!(value["type"], "state");
        let data = &value["data"];
        assert_eq!(data["version"], 1);
        assert_eq!(data["toPlay"], "white");
        assert_eq!(data["result"], "inProgress");
        assert_eq!(data["yourColor"], "white");
        assert!(data["board"].as_str().unwrap().len() == 64);
        assert!(data["plies"].is_array());
    }
}
