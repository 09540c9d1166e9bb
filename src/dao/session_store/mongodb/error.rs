use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save attendee `{id}`")]
    SaveAttendee {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete attendee `{id}`")]
    DeleteAttendee {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load attendee")]
    LoadAttendee {
        #[source]
        source: MongoError,
    },
    #[error("failed to count attendees")]
    CountAttendees {
        #[source]
        source: MongoError,
    },
    #[error("failed to load question `{id}`")]
    LoadQuestion {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load quiz `{id}`")]
    LoadQuiz {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list questions of quiz `{quiz_id}`")]
    ListQuizQuestions {
        quiz_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to save response to question `{question_id}`")]
    SaveResponse {
        question_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to count responses to question `{question_id}`")]
    CountResponses {
        question_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list quiz responses")]
    ListResponses {
        #[source]
        source: MongoError,
    },
    #[error("failed to save game score `{id}`")]
    SaveScore {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load top game score")]
    LoadScore {
        #[source]
        source: MongoError,
    },
    #[error("failed to save activity state")]
    SaveActivityState {
        #[source]
        source: MongoError,
    },
    #[error("failed to load activity state")]
    LoadActivityState {
        #[source]
        source: MongoError,
    },
}
