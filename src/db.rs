use futures::future::BoxFuture;
use uuid::Uuid;

use crate::auth::{Credential, Identity};
use crate::body::{ActivityLevel, BodyComposition, GoalDiet};
use crate::client::{Client, ClientDetails, ClientId};
use crate::errors::BackendError;
use crate::nutrition::NutritionEntry;
use crate::training::{SessionUpdate, TrainingSession};

pub mod memory;

pub trait Db {
    fn retrieve_credential(
        &self,
        username: &str,
    ) -> BoxFuture<Result<Option<Credential>, BackendError>>;

    fn create_credential(&self, credential: Credential) -> BoxFuture<Result<(), BackendError>>;

    /// Persists a new login token for `username` and returns it.
    fn create_login(&self, username: &str) -> BoxFuture<Result<Uuid, BackendError>>;

    fn lookup_login(&self, token: &Uuid) -> BoxFuture<Result<Option<Identity>, BackendError>>;

    fn delete_login(&self, token: &Uuid) -> BoxFuture<Result<(), BackendError>>;

    fn retrieve_exercises(&self) -> BoxFuture<Result<Vec<String>, BackendError>>;

    fn insert_exercise(&self, name: &str) -> BoxFuture<Result<(), BackendError>>;

    fn retrieve_activity_levels(&self) -> BoxFuture<Result<Vec<ActivityLevel>, BackendError>>;

    fn retrieve_goal_diets(&self) -> BoxFuture<Result<Vec<GoalDiet>, BackendError>>;

    fn retrieve_clients(&self) -> BoxFuture<Result<Vec<Client>, BackendError>>;

    fn retrieve_client(&self, id: &ClientId) -> BoxFuture<Result<Option<Client>, BackendError>>;

    fn insert_client(&self, client: Client) -> BoxFuture<Result<(), BackendError>>;

    fn update_client(
        &self,
        id: &ClientId,
        details: ClientDetails,
    ) -> BoxFuture<Result<(), BackendError>>;

    /// Deletes a client along with their sessions, body compositions
    /// and nutrition entries.
    fn delete_client(&self, id: &ClientId) -> BoxFuture<Result<(), BackendError>>;

    fn count_clients(&self) -> BoxFuture<Result<i64, BackendError>>;

    /// Sessions of one client, or of everybody when `client` is `None`,
    /// newest first.
    fn retrieve_sessions(
        &self,
        client: Option<&ClientId>,
    ) -> BoxFuture<Result<Vec<TrainingSession>, BackendError>>;

    fn retrieve_session(
        &self,
        id: &Uuid,
    ) -> BoxFuture<Result<Option<TrainingSession>, BackendError>>;

    fn insert_session(&self, session: TrainingSession) -> BoxFuture<Result<(), BackendError>>;

    fn update_session(
        &self,
        id: &Uuid,
        update: SessionUpdate,
    ) -> BoxFuture<Result<(), BackendError>>;

    fn delete_session(&self, id: &Uuid) -> BoxFuture<Result<(), BackendError>>;

    fn retrieve_body_compositions(
        &self,
        client: &ClientId,
    ) -> BoxFuture<Result<Vec<BodyComposition>, BackendError>>;

    fn insert_body_composition(
        &self,
        snapshot: BodyComposition,
    ) -> BoxFuture<Result<(), BackendError>>;

    fn retrieve_nutrition(
        &self,
        client: &ClientId,
    ) -> BoxFuture<Result<Vec<NutritionEntry>, BackendError>>;

    /// Records a meal photo. A second photo for the same client, date
    /// and slot replaces the first; the ID of the surviving entry is
    /// returned.
    fn upsert_nutrition(&self, entry: NutritionEntry) -> BoxFuture<Result<Uuid, BackendError>>;
}

pub use self::postgres::*;

mod postgres {
    use std::convert::TryFrom;

    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
    };
    use time::Date;
    use url::Url;
    use uuid::Uuid;

    use crate::auth::{Credential, Identity};
    use crate::body::{ActivityLevel, BodyComposition, GoalDiet, Measurement};
    use crate::client::{Client, ClientDetails, ClientId};
    use crate::errors::BackendError;
    use crate::nutrition::{MealSlot, NutritionEntry};
    use crate::training::{SessionDetails, SessionUpdate, SetMeasure, TrainingSession};

    const CLIENTS_ID_CONSTRAINT: &str = "clients_primary_key";
    const CREDENTIALS_USERNAME_CONSTRAINT: &str = "credentials_primary_key";
    const EXERCISES_NAME_CONSTRAINT: &str = "exercises_primary_key";
    const CLIENT_REFERENCE_CONSTRAINTS: &[&str] = &[
        "training_sessions_client",
        "body_compositions_client",
        "nutrition_entries_client",
    ];

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn retrieve_credential(
            &self,
            username: &str,
        ) -> BoxFuture<Result<Option<Credential>, BackendError>> {
            let username = username.to_owned();

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_credential.sql"));

                let credential = query
                    .bind(username)
                    .try_map(|row: PgRow| {
                        Ok(Credential::new(
                            try_get(&row, "username")?,
                            try_get(&row, "name")?,
                            try_get(&row, "password_hash")?,
                        ))
                    })
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(credential)
            }
            .boxed()
        }

        fn create_credential(&self, credential: Credential) -> BoxFuture<Result<(), BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/create_credential.sql"));

                query
                    .bind(credential.username)
                    .bind(credential.name)
                    .bind(credential.password_hash)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn create_login(&self, username: &str) -> BoxFuture<Result<Uuid, BackendError>> {
            let username = username.to_owned();

            async move {
                let token = Uuid::new_v4();
                let query = sqlx::query(include_str!("queries/create_login.sql"));

                query
                    .bind(token)
                    .bind(username)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(token)
            }
            .boxed()
        }

        fn lookup_login(&self, token: &Uuid) -> BoxFuture<Result<Option<Identity>, BackendError>> {
            let token = *token;

            async move {
                let query = sqlx::query(include_str!("queries/lookup_login.sql"));

                let identity = query
                    .bind(token)
                    .try_map(|row: PgRow| {
                        Ok(Identity::new(
                            try_get(&row, "username")?,
                            try_get(&row, "name")?,
                        ))
                    })
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(identity)
            }
            .boxed()
        }

        fn delete_login(&self, token: &Uuid) -> BoxFuture<Result<(), BackendError>> {
            let token = *token;

            async move {
                let query = sqlx::query(include_str!("queries/delete_login.sql"));

                query
                    .bind(token)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        #[allow(clippy::needless_question_mark)]
        fn retrieve_exercises(&self) -> BoxFuture<Result<Vec<String>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_exercises.sql"));

                let names: Vec<String> = query
                    .try_map(|row: PgRow| Ok(try_get(&row, "name")?))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(names)
            }
            .boxed()
        }

        fn insert_exercise(&self, name: &str) -> BoxFuture<Result<(), BackendError>> {
            let name = name.to_owned();

            async move {
                let query = sqlx::query(include_str!("queries/insert_exercise.sql"));

                query
                    .bind(name)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn retrieve_activity_levels(&self) -> BoxFuture<Result<Vec<ActivityLevel>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_activity_levels.sql"));

                let levels = query
                    .try_map(|row: PgRow| {
                        let key: String = try_get(&row, "key")?;
                        let multiplier: f64 = try_get(&row, "multiplier")?;

                        Ok(ActivityLevel::new(key, multiplier))
                    })
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(levels)
            }
            .boxed()
        }

        fn retrieve_goal_diets(&self) -> BoxFuture<Result<Vec<GoalDiet>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_goal_diets.sql"));

                let diets = query
                    .try_map(|row: PgRow| {
                        let key: String = try_get(&row, "key")?;

                        Ok(GoalDiet::new(
                            key,
                            try_get(&row, "caloric_adjustment")?,
                            try_get(&row, "protein_pct")?,
                            try_get(&row, "carbs_pct")?,
                            try_get(&row, "fats_pct")?,
                        ))
                    })
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(diets)
            }
            .boxed()
        }

        fn retrieve_clients(&self) -> BoxFuture<Result<Vec<Client>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_clients.sql"));

                let clients = query
                    .try_map(|row: PgRow| new_client(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(clients)
            }
            .boxed()
        }

        fn retrieve_client(&self, id: &ClientId) -> BoxFuture<Result<Option<Client>, BackendError>> {
            let id = id.clone();

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_client.sql"));

                let client = query
                    .bind(id.as_str())
                    .try_map(|row: PgRow| new_client(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(client)
            }
            .boxed()
        }

        fn insert_client(&self, client: Client) -> BoxFuture<Result<(), BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/insert_client.sql"));
                let Client { id, details } = client;

                query
                    .bind(id.as_str())
                    .bind(details.first_name)
                    .bind(details.last_name)
                    .bind(details.date_of_birth)
                    .bind(details.program)
                    .bind(details.source)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn update_client(
            &self,
            id: &ClientId,
            details: ClientDetails,
        ) -> BoxFuture<Result<(), BackendError>> {
            let id = id.clone();

            async move {
                let query = sqlx::query(include_str!("queries/update_client.sql"));

                let count = query
                    .bind(id.as_str())
                    .bind(details.first_name)
                    .bind(details.last_name)
                    .bind(details.date_of_birth)
                    .bind(details.program)
                    .bind(details.source)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(BackendError::NonExistentClient(id.to_string()))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn delete_client(&self, id: &ClientId) -> BoxFuture<Result<(), BackendError>> {
            let id = id.clone();

            async move {
                let query = sqlx::query(include_str!("queries/delete_client.sql"));

                let count = query
                    .bind(id.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(BackendError::NonExistentClient(id.to_string()))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn count_clients(&self) -> BoxFuture<Result<i64, BackendError>> {
            async move {
                let query = sqlx::query_as::<_, (i64,)>(include_str!("queries/count_clients.sql"));

                let (count,) = query.fetch_one(&self.pool).await.map_err(map_sqlx_error)?;

                Ok(count)
            }
            .boxed()
        }

        fn retrieve_sessions(
            &self,
            client: Option<&ClientId>,
        ) -> BoxFuture<Result<Vec<TrainingSession>, BackendError>> {
            let client = client.map(|id| id.as_str().to_owned());

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_sessions.sql"));

                let sessions = query
                    .bind(client)
                    .try_map(|row: PgRow| new_session(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(sessions)
            }
            .boxed()
        }

        fn retrieve_session(
            &self,
            id: &Uuid,
        ) -> BoxFuture<Result<Option<TrainingSession>, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_session.sql"));

                let session = query
                    .bind(id)
                    .try_map(|row: PgRow| new_session(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(session)
            }
            .boxed()
        }

        fn insert_session(&self, session: TrainingSession) -> BoxFuture<Result<(), BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/insert_session.sql"));
                let (reps, duration_secs) = measure_columns(session.measure())?;

                query
                    .bind(session.id)
                    .bind(session.client_id.as_str())
                    .bind(session.date())
                    .bind(session.exercise())
                    .bind(signed("sets", session.sets())?)
                    .bind(reps)
                    .bind(duration_secs)
                    .bind(session.load_kg())
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn update_session(
            &self,
            id: &Uuid,
            update: SessionUpdate,
        ) -> BoxFuture<Result<(), BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/update_session.sql"));
                let (reps, duration_secs) = measure_columns(update.measure)?;

                let count = query
                    .bind(id)
                    .bind(signed("sets", update.sets)?)
                    .bind(reps)
                    .bind(duration_secs)
                    .bind(update.load_kg)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(BackendError::NonExistentSession(id))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn delete_session(&self, id: &Uuid) -> BoxFuture<Result<(), BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/delete_session.sql"));

                let count = query
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(BackendError::NonExistentSession(id))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn retrieve_body_compositions(
            &self,
            client: &ClientId,
        ) -> BoxFuture<Result<Vec<BodyComposition>, BackendError>> {
            let client = client.clone();

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_body_compositions.sql"));

                let snapshots = query
                    .bind(client.as_str())
                    .try_map(|row: PgRow| {
                        let measurement = Measurement::new(
                            try_get(&row, "measured_on")?,
                            try_get(&row, "date_of_birth")?,
                            try_get(&row, "body_wt_kg")?,
                            try_get(&row, "body_fat_pct")?,
                            try_get(&row, "height_cm")?,
                            try_get::<String>(&row, "activity_level")?,
                            try_get::<String>(&row, "goal_diet")?,
                        );

                        Ok(BodyComposition::new(
                            try_get(&row, "id")?,
                            client_id(&row, "client_id")?,
                            measurement,
                        ))
                    })
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(snapshots)
            }
            .boxed()
        }

        fn insert_body_composition(
            &self,
            snapshot: BodyComposition,
        ) -> BoxFuture<Result<(), BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/insert_body_composition.sql"));
                let BodyComposition {
                    id,
                    client_id,
                    measurement: m,
                } = snapshot;

                query
                    .bind(id)
                    .bind(client_id.as_str())
                    .bind(m.measured_on)
                    .bind(m.date_of_birth)
                    .bind(m.body_wt_kg)
                    .bind(m.body_fat_pct)
                    .bind(m.height_cm)
                    .bind(m.activity_level)
                    .bind(m.goal_diet)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn retrieve_nutrition(
            &self,
            client: &ClientId,
        ) -> BoxFuture<Result<Vec<NutritionEntry>, BackendError>> {
            let client = client.clone();

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_nutrition.sql"));

                let entries = query
                    .bind(client.as_str())
                    .try_map(|row: PgRow| {
                        let date: Date = try_get(&row, "entry_date")?;
                        let meal: String = try_get(&row, "meal")?;
                        let meal: MealSlot = meal
                            .parse()
                            .map_err(|e: BackendError| sqlx::Error::Decode(Box::new(e)))?;

                        let url: String = try_get(&row, "image_url")?;
                        let url: Url = Url::parse(&url).map_err(|source| {
                            sqlx::Error::Decode(Box::new(BackendError::UnableToParseUrl {
                                url,
                                source,
                            }))
                        })?;

                        Ok(NutritionEntry::new(
                            try_get(&row, "id")?,
                            client_id(&row, "client_id")?,
                            date,
                            meal,
                            url,
                        ))
                    })
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(entries)
            }
            .boxed()
        }

        fn upsert_nutrition(&self, entry: NutritionEntry) -> BoxFuture<Result<Uuid, BackendError>> {
            async move {
                let query = sqlx::query_as(include_str!("queries/upsert_nutrition.sql"));

                let (id,): (Uuid,) = query
                    .bind(entry.id)
                    .bind(entry.client_id.as_str())
                    .bind(entry.date)
                    .bind(entry.meal.key())
                    .bind(entry.image_url.as_str())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }
    }

    fn new_client(row: &PgRow) -> Result<Client, sqlx::Error> {
        let details = ClientDetails::new(
            try_get::<String>(row, "first_name")?,
            try_get::<String>(row, "last_name")?,
            try_get(row, "date_of_birth")?,
            try_get::<String>(row, "program")?,
            try_get::<String>(row, "source")?,
        );

        Ok(Client::new(client_id(row, "id")?, details))
    }

    fn new_session(row: &PgRow) -> Result<TrainingSession, sqlx::Error> {
        let reps: Option<i32> = try_get(row, "reps")?;
        let duration_secs: Option<i32> = try_get(row, "duration_secs")?;

        let measure = match (reps, duration_secs) {
            (Some(reps), None) => SetMeasure::Reps(unsigned(reps)?),
            (None, Some(secs)) => SetMeasure::Duration(unsigned(secs)?),
            _ => {
                // the table's check constraint rules this out
                return Err(sqlx::Error::Decode(Box::new(
                    BackendError::MalformedMeasure(format!("{:?}/{:?}", reps, duration_secs)),
                )));
            }
        };

        let sets: i32 = try_get(row, "sets")?;
        let details = SessionDetails::new(
            try_get(row, "session_date")?,
            try_get::<String>(row, "exercise")?,
            unsigned(sets)?,
            measure,
            try_get(row, "load_kg")?,
        );

        Ok(TrainingSession::new(
            try_get(row, "id")?,
            client_id(row, "client_id")?,
            details,
        ))
    }

    fn measure_columns(measure: SetMeasure) -> Result<(Option<i32>, Option<i32>), BackendError> {
        Ok(match measure {
            SetMeasure::Reps(reps) => (Some(signed("measure", reps)?), None),
            SetMeasure::Duration(secs) => (None, Some(signed("measure", secs)?)),
        })
    }

    /// `INTEGER` columns are signed; never store a count that would
    /// read back negative.
    fn signed(field: &'static str, value: u32) -> Result<i32, BackendError> {
        i32::try_from(value).map_err(|_| BackendError::InvalidField {
            field,
            reason: "is too large",
        })
    }

    fn unsigned(value: i32) -> Result<u32, sqlx::Error> {
        u32::try_from(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    fn client_id(row: &PgRow, column: &str) -> Result<ClientId, sqlx::Error> {
        let raw: String = try_get(row, column)?;

        ClientId::parse(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        use sqlx::Error;

        match error {
            Error::Database(ref e) if e.constraint() == Some(CLIENTS_ID_CONSTRAINT) => {
                BackendError::ClientAlreadyExists
            }
            Error::Database(ref e) if e.constraint() == Some(EXERCISES_NAME_CONSTRAINT) => {
                BackendError::ExerciseAlreadyExists
            }
            Error::Database(ref e) if e.constraint() == Some(CREDENTIALS_USERNAME_CONSTRAINT) => {
                BackendError::UsernameAlreadyExists
            }
            Error::Database(ref e)
                if e
                    .constraint()
                    .map_or(false, |c| CLIENT_REFERENCE_CONSTRAINTS.contains(&c)) =>
            {
                BackendError::UnknownClient
            }
            _ => BackendError::Sqlx { source: error },
        }
    }
}
