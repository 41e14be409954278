//! BSON document mirrors of the storage entities.
//!
//! Timestamps are converted to BSON datetimes at this boundary so range
//! queries and TTL tooling stay usable from the shell.

use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    GeneratedImageEntity, PlayerEntity, PlayerStatus, PromptEntity, QuestionEntity, RoomEntity,
    RoomSettings, RoomStatus, RoundEntity, RoundPhase, VoteEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    code: String,
    host_user_id: String,
    status: RoomStatus,
    settings: RoomSettings,
    current_round: Option<u32>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<RoomEntity> for RoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id,
            code: value.code,
            host_user_id: value.host_user_id,
            status: value.status,
            settings: value.settings,
            current_round: value.current_round,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<RoomDocument> for RoomEntity {
    fn from(value: RoomDocument) -> Self {
        Self {
            id: value.id,
            code: value.code,
            host_user_id: value.host_user_id,
            status: value.status,
            settings: value.settings,
            current_round: value.current_round,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    room_id: Uuid,
    user_id: String,
    status: PlayerStatus,
    is_host: bool,
    score: i64,
    created_at: DateTime,
}

impl From<PlayerEntity> for PlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            user_id: value.user_id,
            status: value.status,
            is_host: value.is_host,
            score: value.score,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<PlayerDocument> for PlayerEntity {
    fn from(value: PlayerDocument) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            user_id: value.user_id,
            status: value.status,
            is_host: value.is_host,
            score: value.score,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    room_id: Uuid,
    number: u32,
    question_id: Uuid,
    phase: RoundPhase,
    phase_end_time: DateTime,
    scheduled_timer: Option<Uuid>,
    images_expected: u32,
    images_completed: u32,
    generation_error: Option<String>,
    created_at: DateTime,
}

impl From<RoundEntity> for RoundDocument {
    fn from(value: RoundEntity) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            number: value.number,
            question_id: value.question_id,
            phase: value.phase,
            phase_end_time: DateTime::from_system_time(value.phase_end_time),
            scheduled_timer: value.scheduled_timer,
            images_expected: value.images_expected,
            images_completed: value.images_completed,
            generation_error: value.generation_error,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<RoundDocument> for RoundEntity {
    fn from(value: RoundDocument) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            number: value.number,
            question_id: value.question_id,
            phase: value.phase,
            phase_end_time: value.phase_end_time.to_system_time(),
            scheduled_timer: value.scheduled_timer,
            images_expected: value.images_expected,
            images_completed: value.images_completed,
            generation_error: value.generation_error,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    round_id: Uuid,
    player_id: Uuid,
    text: String,
    submitted_at: DateTime,
}

impl From<PromptEntity> for PromptDocument {
    fn from(value: PromptEntity) -> Self {
        Self {
            id: value.id,
            round_id: value.round_id,
            player_id: value.player_id,
            text: value.text,
            submitted_at: DateTime::from_system_time(value.submitted_at),
        }
    }
}

impl From<PromptDocument> for PromptEntity {
    fn from(value: PromptDocument) -> Self {
        Self {
            id: value.id,
            round_id: value.round_id,
            player_id: value.player_id,
            text: value.text,
            submitted_at: value.submitted_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    round_id: Uuid,
    prompt_id: Uuid,
    player_id: Uuid,
    url: Option<String>,
    error: Option<String>,
    metadata: Option<String>,
    created_at: DateTime,
}

impl From<GeneratedImageEntity> for ImageDocument {
    fn from(value: GeneratedImageEntity) -> Self {
        Self {
            id: value.id,
            round_id: value.round_id,
            prompt_id: value.prompt_id,
            player_id: value.player_id,
            url: value.url,
            error: value.error,
            metadata: value.metadata,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<ImageDocument> for GeneratedImageEntity {
    fn from(value: ImageDocument) -> Self {
        Self {
            id: value.id,
            round_id: value.round_id,
            prompt_id: value.prompt_id,
            player_id: value.player_id,
            url: value.url,
            error: value.error,
            metadata: value.metadata,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    round_id: Uuid,
    voter_id: Uuid,
    image_id: Uuid,
    submitted_at: DateTime,
}

impl From<VoteEntity> for VoteDocument {
    fn from(value: VoteEntity) -> Self {
        Self {
            id: value.id,
            round_id: value.round_id,
            voter_id: value.voter_id,
            image_id: value.image_id,
            submitted_at: DateTime::from_system_time(value.submitted_at),
        }
    }
}

impl From<VoteDocument> for VoteEntity {
    fn from(value: VoteDocument) -> Self {
        Self {
            id: value.id,
            round_id: value.round_id,
            voter_id: value.voter_id,
            image_id: value.image_id,
            submitted_at: value.submitted_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    text: String,
    active: bool,
    created_at: DateTime,
}

impl From<QuestionEntity> for QuestionDocument {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            text: value.text,
            active: value.active,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<QuestionDocument> for QuestionEntity {
    fn from(value: QuestionDocument) -> Self {
        Self {
            id: value.id,
            text: value.text,
            active: value.active,
            created_at: value.created_at.to_system_time(),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
