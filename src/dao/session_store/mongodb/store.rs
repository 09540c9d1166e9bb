use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        ACTIVITY_STATE_ID, MongoActivityStateDocument, MongoAttendeeDocument,
        MongoGameScoreDocument, MongoPollQuestionDocument, MongoPollResponseDocument,
        MongoQuizDocument, MongoQuizQuestionDocument, MongoQuizResponseDocument, doc_id,
        uuid_as_binary,
    },
};
use crate::dao::{
    models::{
        ActivityStateEntity, AttendeeEntity, GameScoreEntity, PollQuestionEntity,
        PollResponseEntity, QuizEntity, QuizQuestionEntity, QuizResponseEntity, ResponseKind,
    },
    session_store::SessionStore,
    storage::StorageResult,
};

const ATTENDEE_COLLECTION: &str = "attendees";
const POLL_QUESTION_COLLECTION: &str = "poll_questions";
const QUIZ_COLLECTION: &str = "quizzes";
const QUIZ_QUESTION_COLLECTION: &str = "quiz_questions";
const POLL_RESPONSE_COLLECTION: &str = "poll_responses";
const QUIZ_RESPONSE_COLLECTION: &str = "quiz_responses";
const GAME_SCORE_COLLECTION: &str = "game_scores";
const ACTIVITY_STATE_COLLECTION: &str = "activity_state";

/// MongoDB-backed [`SessionStore`].
#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

/// The uniqueness constraints turn duplicate inserts into idempotent
/// no-ops, so a raced double submission never surfaces as an error.
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == 11000
    )
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let unique = |name: &str| {
            IndexOptions::builder()
                .name(Some(name.to_owned()))
                .unique(Some(true))
                .build()
        };

        let attendee_coll = database.collection::<MongoAttendeeDocument>(ATTENDEE_COLLECTION);
        for (keys, index_name, index) in [
            (doc! {"name": 1}, "attendee_name_idx", "name"),
            (doc! {"session_token": 1}, "attendee_token_idx", "session_token"),
        ] {
            let model = mongodb::IndexModel::builder()
                .keys(keys)
                .options(unique(index_name))
                .build();
            attendee_coll
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: ATTENDEE_COLLECTION,
                    index,
                    source,
                })?;
        }

        // At most one response per (question, attendee), enforced by the
        // database so concurrent check-then-insert races fail closed.
        for collection in [POLL_RESPONSE_COLLECTION, QUIZ_RESPONSE_COLLECTION] {
            let model = mongodb::IndexModel::builder()
                .keys(doc! {"question_id": 1, "attendee_id": 1})
                .options(unique("response_question_attendee_idx"))
                .build();
            database
                .collection::<mongodb::bson::Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: "responses",
                    index: "question_id,attendee_id",
                    source,
                })?;
        }

        let quiz_question_coll =
            database.collection::<MongoQuizQuestionDocument>(QUIZ_QUESTION_COLLECTION);
        let model = mongodb::IndexModel::builder()
            .keys(doc! {"quiz_id": 1, "created_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("quiz_question_order_idx".to_owned()))
                    .build(),
            )
            .build();
        quiz_question_coll
            .create_index(model)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: QUIZ_QUESTION_COLLECTION,
                index: "quiz_id,created_at",
                source,
            })?;

        let score_coll = database.collection::<MongoGameScoreDocument>(GAME_SCORE_COLLECTION);
        let model = mongodb::IndexModel::builder()
            .keys(doc! {"score": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("game_score_idx".to_owned()))
                    .build(),
            )
            .build();
        score_coll
            .create_index(model)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_SCORE_COLLECTION,
                index: "score",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn find_attendee(&self, id: Uuid) -> MongoResult<Option<AttendeeEntity>> {
        let collection = self
            .collection::<MongoAttendeeDocument>(ATTENDEE_COLLECTION)
            .await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadAttendee { source })?;
        Ok(document.map(Into::into))
    }

    async fn find_attendee_by_token(&self, token: String) -> MongoResult<Option<AttendeeEntity>> {
        let collection = self
            .collection::<MongoAttendeeDocument>(ATTENDEE_COLLECTION)
            .await;
        let document = collection
            .find_one(doc! {"session_token": token})
            .await
            .map_err(|source| MongoDaoError::LoadAttendee { source })?;
        Ok(document.map(Into::into))
    }

    async fn insert_attendee(&self, attendee: AttendeeEntity) -> MongoResult<bool> {
        let id = attendee.id;
        let collection = self
            .collection::<MongoAttendeeDocument>(ATTENDEE_COLLECTION)
            .await;
        match collection.insert_one(MongoAttendeeDocument::from(attendee)).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::SaveAttendee { id, source }),
        }
    }

    async fn delete_attendee(&self, id: Uuid) -> MongoResult<bool> {
        let filter = doc! {"attendee_id": uuid_as_binary(id)};

        // Cascade the attendee's responses and scores before the identity row.
        for collection in [
            POLL_RESPONSE_COLLECTION,
            QUIZ_RESPONSE_COLLECTION,
            GAME_SCORE_COLLECTION,
        ] {
            self.collection::<mongodb::bson::Document>(collection)
                .await
                .delete_many(filter.clone())
                .await
                .map_err(|source| MongoDaoError::DeleteAttendee { id, source })?;
        }

        let collection = self
            .collection::<MongoAttendeeDocument>(ATTENDEE_COLLECTION)
            .await;
        let result = collection
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteAttendee { id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn count_attendees(&self) -> MongoResult<u64> {
        let collection = self
            .collection::<MongoAttendeeDocument>(ATTENDEE_COLLECTION)
            .await;
        collection
            .count_documents(doc! {})
            .await
            .map_err(|source| MongoDaoError::CountAttendees { source })
    }

    async fn find_poll_question(&self, id: Uuid) -> MongoResult<Option<PollQuestionEntity>> {
        let collection = self
            .collection::<MongoPollQuestionDocument>(POLL_QUESTION_COLLECTION)
            .await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadQuestion { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_quiz(&self, id: Uuid) -> MongoResult<Option<QuizEntity>> {
        let collection = self.collection::<MongoQuizDocument>(QUIZ_COLLECTION).await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadQuiz { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_quiz_question(&self, id: Uuid) -> MongoResult<Option<QuizQuestionEntity>> {
        let collection = self
            .collection::<MongoQuizQuestionDocument>(QUIZ_QUESTION_COLLECTION)
            .await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadQuestion { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_quiz_questions(&self, quiz_id: Uuid) -> MongoResult<Vec<QuizQuestionEntity>> {
        let collection = self
            .collection::<MongoQuizQuestionDocument>(QUIZ_QUESTION_COLLECTION)
            .await;
        let documents: Vec<MongoQuizQuestionDocument> = collection
            .find(doc! {"quiz_id": uuid_as_binary(quiz_id)})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListQuizQuestions { quiz_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListQuizQuestions { quiz_id, source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_poll_response(&self, response: PollResponseEntity) -> MongoResult<bool> {
        let question_id = response.question_id;
        let collection = self
            .collection::<MongoPollResponseDocument>(POLL_RESPONSE_COLLECTION)
            .await;
        match collection
            .insert_one(MongoPollResponseDocument::from(response))
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::SaveResponse {
                question_id,
                source,
            }),
        }
    }

    async fn insert_quiz_response(&self, response: QuizResponseEntity) -> MongoResult<bool> {
        let question_id = response.question_id;
        let collection = self
            .collection::<MongoQuizResponseDocument>(QUIZ_RESPONSE_COLLECTION)
            .await;
        match collection
            .insert_one(MongoQuizResponseDocument::from(response))
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::SaveResponse {
                question_id,
                source,
            }),
        }
    }

    async fn count_responses(
        &self,
        kind: ResponseKind,
        question_id: Uuid,
        option_index: u32,
    ) -> MongoResult<u64> {
        let collection = match kind {
            ResponseKind::Poll => POLL_RESPONSE_COLLECTION,
            ResponseKind::Quiz => QUIZ_RESPONSE_COLLECTION,
        };
        self.collection::<mongodb::bson::Document>(collection)
            .await
            .count_documents(doc! {
                "question_id": uuid_as_binary(question_id),
                "selected_option": option_index,
            })
            .await
            .map_err(|source| MongoDaoError::CountResponses {
                question_id,
                source,
            })
    }

    async fn list_quiz_responses(
        &self,
        question_ids: Vec<Uuid>,
    ) -> MongoResult<Vec<QuizResponseEntity>> {
        let ids: Vec<_> = question_ids.into_iter().map(uuid_as_binary).collect();
        let collection = self
            .collection::<MongoQuizResponseDocument>(QUIZ_RESPONSE_COLLECTION)
            .await;
        let documents: Vec<MongoQuizResponseDocument> = collection
            .find(doc! {"question_id": {"$in": ids}})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListResponses { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListResponses { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_game_score(&self, score: GameScoreEntity) -> MongoResult<()> {
        let id = score.id;
        let collection = self
            .collection::<MongoGameScoreDocument>(GAME_SCORE_COLLECTION)
            .await;
        collection
            .insert_one(MongoGameScoreDocument::from(score))
            .await
            .map_err(|source| MongoDaoError::SaveScore { id, source })?;
        Ok(())
    }

    async fn top_game_score(&self) -> MongoResult<Option<GameScoreEntity>> {
        let collection = self
            .collection::<MongoGameScoreDocument>(GAME_SCORE_COLLECTION)
            .await;
        let document = collection
            .find_one(doc! {})
            .sort(doc! {"score": -1})
            .await
            .map_err(|source| MongoDaoError::LoadScore { source })?;
        Ok(document.map(Into::into))
    }

    async fn save_activity_state(&self, state: ActivityStateEntity) -> MongoResult<()> {
        let collection = self
            .collection::<MongoActivityStateDocument>(ACTIVITY_STATE_COLLECTION)
            .await;
        collection
            .replace_one(
                doc! {"_id": ACTIVITY_STATE_ID},
                &MongoActivityStateDocument::from(state),
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveActivityState { source })?;
        Ok(())
    }

    async fn load_activity_state(&self) -> MongoResult<Option<ActivityStateEntity>> {
        let collection = self
            .collection::<MongoActivityStateDocument>(ACTIVITY_STATE_COLLECTION)
            .await;
        let document = collection
            .find_one(doc! {"_id": ACTIVITY_STATE_ID})
            .await
            .map_err(|source| MongoDaoError::LoadActivityState { source })?;
        Ok(document.map(Into::into))
    }
}

impl SessionStore for MongoSessionStore {
    fn find_attendee(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<AttendeeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_attendee(id).await.map_err(Into::into) })
    }

    fn find_attendee_by_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<AttendeeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_attendee_by_token(token).await.map_err(Into::into) })
    }

    fn insert_attendee(
        &self,
        attendee: AttendeeEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.insert_attendee(attendee).await.map_err(Into::into) })
    }

    fn delete_attendee(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_attendee(id).await.map_err(Into::into) })
    }

    fn count_attendees(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_attendees().await.map_err(Into::into) })
    }

    fn find_poll_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PollQuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_poll_question(id).await.map_err(Into::into) })
    }

    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_quiz(id).await.map_err(Into::into) })
    }

    fn find_quiz_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuizQuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_quiz_question(id).await.map_err(Into::into) })
    }

    fn list_quiz_questions(
        &self,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizQuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_quiz_questions(quiz_id).await.map_err(Into::into) })
    }

    fn insert_poll_response(
        &self,
        response: PollResponseEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.insert_poll_response(response).await.map_err(Into::into) })
    }

    fn insert_quiz_response(
        &self,
        response: QuizResponseEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.insert_quiz_response(response).await.map_err(Into::into) })
    }

    fn count_responses(
        &self,
        kind: ResponseKind,
        question_id: Uuid,
        option_index: u32,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .count_responses(kind, question_id, option_index)
                .await
                .map_err(Into::into)
        })
    }

    fn list_quiz_responses(
        &self,
        question_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizResponseEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_quiz_responses(question_ids)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_game_score(
        &self,
        score: GameScoreEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_game_score(score).await.map_err(Into::into) })
    }

    fn top_game_score(&self) -> BoxFuture<'static, StorageResult<Option<GameScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.top_game_score().await.map_err(Into::into) })
    }

    fn save_activity_state(
        &self,
        state: ActivityStateEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_activity_state(state).await.map_err(Into::into) })
    }

    fn load_activity_state(
        &self,
    ) -> BoxFuture<'static, StorageResult<Option<ActivityStateEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_activity_state().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
