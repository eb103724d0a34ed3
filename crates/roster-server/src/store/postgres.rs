//! Postgres-backed student store

use async_trait::async_trait;
use roster_common::types::Student;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{QueryPage, RecordStore, StoreError, StoreResult, StudentQuery, StudentQueries};

/// Rows per INSERT statement inside one batch transaction.
pub const INSERT_CHUNK_SIZE: usize = 500;

#[derive(Debug, FromRow)]
struct StudentRow {
    id: Uuid,
    name: String,
    subject: String,
    grade: i64,
}

impl TryFrom<StudentRow> for Student {
    type Error = StoreError;

    fn try_from(row: StudentRow) -> Result<Self, Self::Error> {
        let grade = u32::try_from(row.grade)
            .map_err(|_| StoreError::OutOfRange(format!("grade {} for {}", row.grade, row.id)))?;
        Ok(Student {
            id: row.id,
            name: row.name,
            subject: row.subject,
            grade,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgStudentStore {
    pool: PgPool,
}

impl PgStudentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a StudentQuery) {
        builder.push(" WHERE TRUE");
        if let Some(name) = &query.name {
            builder
                .push(" AND name ILIKE ")
                .push_bind(format!("%{}%", escape_like(name)));
        }
        if let Some(subject) = &query.subject {
            builder.push(" AND subject = ").push_bind(subject);
        }
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn identifier(row: &Student) -> Uuid {
    if row.id.is_nil() {
        Uuid::new_v4()
    } else {
        row.id
    }
}

#[async_trait]
impl RecordStore<Student> for PgStudentStore {
    async fn insert_batch(&self, rows: &[Student]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO students (id, name, subject, grade) ");
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(identifier(row))
                    .push_bind(&row.name)
                    .push_bind(&row.subject)
                    .push_bind(i64::from(row.grade));
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert(&self, row: &Student) -> StoreResult<()> {
        sqlx::query("INSERT INTO students (id, name, subject, grade) VALUES ($1, $2, $3, $4)")
            .bind(identifier(row))
            .bind(&row.name)
            .bind(&row.subject)
            .bind(i64::from(row.grade))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StudentQueries for PgStudentStore {
    async fn query(&self, query: &StudentQuery) -> StoreResult<QueryPage> {
        let mut count_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM students");
        Self::push_filters(&mut count_builder, query);
        let count: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT id, name, subject, grade FROM students");
        Self::push_filters(&mut builder, query);
        match query.sort {
            Some((column, order)) => {
                builder
                    .push(" ORDER BY ")
                    .push(column.as_sql())
                    .push(" ")
                    .push(order.as_sql())
                    .push(", id");
            },
            None => {
                builder.push(" ORDER BY created_at, id");
            },
        }
        builder
            .push(" LIMIT ")
            .push_bind(i64::from(query.size))
            .push(" OFFSET ")
            .push_bind(query.offset());

        let rows: Vec<StudentRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        let records = rows
            .into_iter()
            .map(Student::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(QueryPage { count, records })
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Vec<Student>> {
        let rows: Vec<StudentRow> = sqlx::query_as(
            "SELECT id, name, subject, grade FROM students WHERE name = $1 ORDER BY created_at, id",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Student::try_from).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::{paginate, sorted_by, with_subject, SortColumn, SortOrder};

    fn batch(n: usize) -> Vec<Student> {
        (0..n)
            .map(|i| Student::new(format!("Student {i:04}"), "Physics", (i % 100) as u32 + 1))
            .collect()
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_insert_batch_spans_chunks(pool: PgPool) {
        let store = PgStudentStore::new(pool);
        store.insert_batch(&batch(INSERT_CHUNK_SIZE + 7)).await.unwrap();

        let page = store.query(&StudentQuery::default()).await.unwrap();
        assert_eq!(page.count, (INSERT_CHUNK_SIZE + 7) as i64);
        assert_eq!(page.records.len(), 100);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_query_filters_and_sorts(pool: PgPool) {
        let store = PgStudentStore::new(pool);
        store
            .insert_batch(&[
                Student::new("Ada", "Mathematics", 99),
                Student::new("Alan", "Mathematics", 88),
                Student::new("Marie", "Chemistry", 97),
            ])
            .await
            .unwrap();

        let query = StudentQuery::from_options([
            with_subject("Mathematics"),
            sorted_by(SortColumn::Grade, SortOrder::Asc),
            paginate(1, 10),
        ]);
        let page = store.query(&query).await.unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.records[0].name, "Alan");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_failed_batch_leaves_nothing(pool: PgPool) {
        let store = PgStudentStore::new(pool);
        let id = Uuid::new_v4();
        let rows = vec![
            Student::new("First", "Art", 1).with_id(id),
            Student::new("Second", "Art", 2).with_id(id),
        ];

        assert!(store.insert_batch(&rows).await.is_err());
        assert!(store.find_by_name("First").await.unwrap().is_empty());
    }
}
