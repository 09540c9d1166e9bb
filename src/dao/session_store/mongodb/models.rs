use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    ActivityKind, ActivityStateEntity, AttendeeEntity, GameScoreEntity, PollQuestionEntity,
    PollResponseEntity, QuizEntity, QuizQuestionEntity, QuizResponseEntity,
};

/// Fixed `_id` of the activity singleton document.
pub const ACTIVITY_STATE_ID: &str = "current";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAttendeeDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    session_token: String,
    created_at: DateTime,
}

impl From<AttendeeEntity> for MongoAttendeeDocument {
    fn from(value: AttendeeEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            session_token: value.session_token,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoAttendeeDocument> for AttendeeEntity {
    fn from(value: MongoAttendeeDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            session_token: value.session_token,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPollQuestionDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    topic_id: Option<Uuid>,
    text: String,
    options: Vec<String>,
    timer_seconds: u32,
    created_at: DateTime,
}

impl From<MongoPollQuestionDocument> for PollQuestionEntity {
    fn from(value: MongoPollQuestionDocument) -> Self {
        Self {
            id: value.id,
            topic_id: value.topic_id,
            text: value.text,
            options: value.options,
            timer_seconds: value.timer_seconds,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuizDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    timer_seconds: u32,
    created_at: DateTime,
}

impl From<MongoQuizDocument> for QuizEntity {
    fn from(value: MongoQuizDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            timer_seconds: value.timer_seconds,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuizQuestionDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    quiz_id: Uuid,
    text: String,
    options: Vec<String>,
    correct_option_index: u32,
    timer_seconds: u32,
    created_at: DateTime,
}

impl From<MongoQuizQuestionDocument> for QuizQuestionEntity {
    fn from(value: MongoQuizQuestionDocument) -> Self {
        Self {
            id: value.id,
            quiz_id: value.quiz_id,
            text: value.text,
            options: value.options,
            correct_option_index: value.correct_option_index,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPollResponseDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    question_id: Uuid,
    attendee_id: Uuid,
    selected_option: u32,
    created_at: DateTime,
}

impl From<PollResponseEntity> for MongoPollResponseDocument {
    fn from(value: PollResponseEntity) -> Self {
        Self {
            id: value.id,
            question_id: value.question_id,
            attendee_id: value.attendee_id,
            selected_option: value.selected_option,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuizResponseDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    question_id: Uuid,
    attendee_id: Uuid,
    selected_option: u32,
    is_correct: bool,
    created_at: DateTime,
}

impl From<QuizResponseEntity> for MongoQuizResponseDocument {
    fn from(value: QuizResponseEntity) -> Self {
        Self {
            id: value.id,
            question_id: value.question_id,
            attendee_id: value.attendee_id,
            selected_option: value.selected_option,
            is_correct: value.is_correct,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoQuizResponseDocument> for QuizResponseEntity {
    fn from(value: MongoQuizResponseDocument) -> Self {
        Self {
            id: value.id,
            question_id: value.question_id,
            attendee_id: value.attendee_id,
            selected_option: value.selected_option,
            is_correct: value.is_correct,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameScoreDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    attendee_id: Uuid,
    score: i64,
    created_at: DateTime,
}

impl From<GameScoreEntity> for MongoGameScoreDocument {
    fn from(value: GameScoreEntity) -> Self {
        Self {
            id: value.id,
            attendee_id: value.attendee_id,
            score: value.score,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoGameScoreDocument> for GameScoreEntity {
    fn from(value: MongoGameScoreDocument) -> Self {
        Self {
            id: value.id,
            attendee_id: value.attendee_id,
            score: value.score,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoActivityStateDocument {
    #[serde(rename = "_id")]
    id: String,
    kind: ActivityKind,
    subject_id: Option<Uuid>,
    started_at: DateTime,
}

impl From<ActivityStateEntity> for MongoActivityStateDocument {
    fn from(value: ActivityStateEntity) -> Self {
        Self {
            id: ACTIVITY_STATE_ID.to_owned(),
            kind: value.kind,
            subject_id: value.subject_id,
            started_at: DateTime::from_system_time(value.started_at),
        }
    }
}

impl From<MongoActivityStateDocument> for ActivityStateEntity {
    fn from(value: MongoActivityStateDocument) -> Self {
        Self {
            kind: value.kind,
            subject_id: value.subject_id,
            started_at: value.started_at.to_system_time(),
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
