//! Aggregation pipelines compiled to nested SQL subqueries.
//!
//! Each stage wraps the SQL of the previous one as a subquery. Column names
//! are tracked from stage to stage, so every field a stage references is
//! checked against what the previous stage actually produces. Values are
//! always bound parameters.

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::filter::{Direction, Filter, FilterValue},
};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Scalar,
    Array,
}

/// Table a pipeline reads from: `(column, exposed name, kind)`
#[derive(Debug, Clone, Copy)]
pub struct Source {
    pub table: &'static str,
    pub columns: &'static [(&'static str, &'static str, ColumnKind)],
}

/// Grouping key of a `Group` stage, exposed as `_id`
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    /// A single group over all rows
    All,
    Field(String),
    Upper(String),
    Month(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Count,
    Sum(String),
    Avg(String),
    Min(String),
    Max(String),
    Push(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: GroupKey,
    pub fields: Vec<(String, Accumulator)>,
}

impl Group {
    pub fn by(key: GroupKey) -> Self {
        Self {
            key,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, accumulator: Accumulator) -> Self {
        self.fields.push((name.to_string(), accumulator));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Unwind(String),
    Group(Group),
    AddField { name: String, from: String },
    Project(Vec<String>),
    Sort(Vec<(String, Direction)>),
    Limit(u32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn first(&self) -> Option<&Stage> {
        self.stages.first()
    }

    pub fn prepend(mut self, stage: Stage) -> Self {
        self.stages.insert(0, stage);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    pub fn unwind(mut self, field: &str) -> Self {
        self.stages.push(Stage::Unwind(field.to_string()));
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.stages.push(Stage::Group(group));
        self
    }

    pub fn add_field(mut self, name: &str, from: &str) -> Self {
        self.stages.push(Stage::AddField {
            name: name.to_string(),
            from: from.to_string(),
        });
        self
    }

    pub fn project(mut self, fields: &[&str]) -> Self {
        self.stages
            .push(Stage::Project(fields.iter().map(|f| f.to_string()).collect()));
        self
    }

    pub fn sort(mut self, field: &str, direction: Direction) -> Self {
        self.stages
            .push(Stage::Sort(vec![(field.to_string(), direction)]));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    /// Build the SQL for this pipeline over `source`
    pub fn compile(&self, source: &Source) -> AppResult<CompiledPipeline> {
        Compiler::new(source).compile(&self.stages)
    }
}

/// SQL text returning one `doc` JSONB column per output row, plus its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPipeline {
    pub sql: String,
    pub binds: Vec<FilterValue>,
}

impl CompiledPipeline {
    pub async fn fetch_all(self, pool: &Pool<Postgres>) -> AppResult<Vec<serde_json::Value>> {
        let mut query = sqlx::query_scalar::<_, serde_json::Value>(&self.sql);
        for value in self.binds {
            query = match value {
                FilterValue::Bool(v) => query.bind(v),
                FilterValue::Int(v) => query.bind(v),
                FilterValue::Float(v) => query.bind(v),
                FilterValue::Text(v) => query.bind(v),
                FilterValue::Timestamp(v) => query.bind(v),
            };
        }
        Ok(query.fetch_all(pool).await?)
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name)
}

fn check_identifier(name: &str) -> AppResult<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid field name {:?}", name)))
    }
}

struct Compiler {
    sql: String,
    columns: Vec<(String, ColumnKind)>,
    ordering: Vec<(String, Direction)>,
    binds: Vec<FilterValue>,
}

impl Compiler {
    fn new(source: &Source) -> Self {
        let select = source
            .columns
            .iter()
            .map(|(column, name, _)| format!("{} AS {}", column, quote(name)))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            sql: format!("SELECT {} FROM {}", select, source.table),
            columns: source
                .columns
                .iter()
                .map(|(_, name, kind)| (name.to_string(), *kind))
                .collect(),
            ordering: Vec::new(),
            binds: Vec::new(),
        }
    }

    fn kind_of(&self, field: &str, stage: usize) -> AppResult<ColumnKind> {
        self.columns
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Unknown field {} in pipeline stage {}",
                    field, stage
                ))
            })
    }

    fn scalar(&self, field: &str, stage: usize) -> AppResult<()> {
        match self.kind_of(field, stage)? {
            ColumnKind::Scalar => Ok(()),
            ColumnKind::Array => Err(AppError::Validation(format!(
                "Field {} is an array in pipeline stage {}",
                field, stage
            ))),
        }
    }

    fn order_by(&self) -> String {
        if self.ordering.is_empty() {
            return String::new();
        }
        let keys = self
            .ordering
            .iter()
            .map(|(field, direction)| format!("{} {}", quote(field), direction.as_sql()))
            .collect::<Vec<_>>()
            .join(", ");
        format!(" ORDER BY {}", keys)
    }

    fn compile(mut self, stages: &[Stage]) -> AppResult<CompiledPipeline> {
        for (i, stage) in stages.iter().enumerate() {
            let alias = format!("s{}", i);
            let inner = std::mem::take(&mut self.sql);

            self.sql = match stage {
                Stage::Match(filter) => {
                    let mut conditions = Vec::with_capacity(filter.conditions.len());
                    for condition in &filter.conditions {
                        self.kind_of(&condition.field, i)?;
                        self.binds.push(condition.value.clone());
                        conditions.push(format!(
                            "{}.{} {} ${}",
                            alias,
                            quote(&condition.field),
                            condition.op.as_sql(),
                            self.binds.len()
                        ));
                    }
                    let where_clause = if conditions.is_empty() {
                        String::new()
                    } else {
                        format!(" WHERE {}", conditions.join(" AND "))
                    };
                    format!("SELECT * FROM ({}) AS {}{}", inner, alias, where_clause)
                }
                Stage::Unwind(field) => {
                    if self.kind_of(field, i)? != ColumnKind::Array {
                        return Err(AppError::Validation(format!(
                            "Cannot unwind non-array field {}",
                            field
                        )));
                    }
                    let select = self
                        .columns
                        .iter()
                        .map(|(name, _)| {
                            if name == field {
                                format!("u{}.v AS {}", i, quote(name))
                            } else {
                                format!("{}.{}", alias, quote(name))
                            }
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    for column in self.columns.iter_mut().filter(|(name, _)| name == field) {
                        column.1 = ColumnKind::Scalar;
                    }
                    format!(
                        "SELECT {} FROM ({}) AS {} CROSS JOIN LATERAL unnest({}.{}) AS u{}(v)",
                        select,
                        inner,
                        alias,
                        alias,
                        quote(field),
                        i
                    )
                }
                Stage::Group(group) => {
                    let key = match &group.key {
                        GroupKey::All => "NULL::text".to_string(),
                        GroupKey::Field(f) => {
                            self.scalar(f, i)?;
                            format!("{}.{}", alias, quote(f))
                        }
                        GroupKey::Upper(f) => {
                            self.scalar(f, i)?;
                            format!("upper({}.{}::text)", alias, quote(f))
                        }
                        GroupKey::Month(f) => {
                            self.scalar(f, i)?;
                            format!("EXTRACT(MONTH FROM {}.{})::int", alias, quote(f))
                        }
                    };

                    let mut select = vec![format!("{} AS \"_id\"", key)];
                    let mut columns = vec![("_id".to_string(), ColumnKind::Scalar)];
                    for (name, accumulator) in &group.fields {
                        check_identifier(name)?;
                        let (expr, kind) = match accumulator {
                            Accumulator::Count => ("COUNT(*)".to_string(), ColumnKind::Scalar),
                            Accumulator::Sum(f)
                            | Accumulator::Avg(f)
                            | Accumulator::Min(f)
                            | Accumulator::Max(f) => {
                                self.scalar(f, i)?;
                                let func = match accumulator {
                                    Accumulator::Sum(_) => "SUM",
                                    Accumulator::Avg(_) => "AVG",
                                    Accumulator::Min(_) => "MIN",
                                    _ => "MAX",
                                };
                                (
                                    format!("{}({}.{})", func, alias, quote(f)),
                                    ColumnKind::Scalar,
                                )
                            }
                            Accumulator::Push(f) => {
                                self.scalar(f, i)?;
                                (
                                    format!("array_agg({}.{})", alias, quote(f)),
                                    ColumnKind::Array,
                                )
                            }
                        };
                        select.push(format!("{} AS {}", expr, quote(name)));
                        columns.push((name.clone(), kind));
                    }

                    self.columns = columns;
                    self.ordering.clear();
                    format!(
                        "SELECT {} FROM ({}) AS {} GROUP BY 1",
                        select.join(", "),
                        inner,
                        alias
                    )
                }
                Stage::AddField { name, from } => {
                    check_identifier(name)?;
                    let kind = self.kind_of(from, i)?;
                    if self.columns.iter().any(|(n, _)| n == name) {
                        return Err(AppError::Validation(format!(
                            "Field {} already exists in pipeline stage {}",
                            name, i
                        )));
                    }
                    self.columns.push((name.clone(), kind));
                    format!(
                        "SELECT {}.*, {}.{} AS {} FROM ({}) AS {}",
                        alias,
                        alias,
                        quote(from),
                        quote(name),
                        inner,
                        alias
                    )
                }
                Stage::Project(fields) => {
                    let mut columns = Vec::with_capacity(fields.len());
                    for field in fields {
                        columns.push((field.clone(), self.kind_of(field, i)?));
                    }
                    self.columns = columns;
                    self.ordering.retain(|(f, _)| fields.contains(f));
                    let select = fields
                        .iter()
                        .map(|f| format!("{}.{}", alias, quote(f)))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("SELECT {} FROM ({}) AS {}", select, inner, alias)
                }
                Stage::Sort(keys) => {
                    for (field, _) in keys {
                        self.kind_of(field, i)?;
                    }
                    self.ordering = keys.clone();
                    format!("SELECT * FROM ({}) AS {}{}", inner, alias, self.order_by())
                }
                Stage::Limit(n) => {
                    format!(
                        "SELECT * FROM ({}) AS {}{} LIMIT {}",
                        inner,
                        alias,
                        self.order_by(),
                        n
                    )
                }
            };
        }

        Ok(CompiledPipeline {
            sql: format!(
                "SELECT to_jsonb(r) AS doc FROM ({}) AS r{}",
                self.sql,
                self.order_by()
            ),
            binds: self.binds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEMS: Source = Source {
        table: "items",
        columns: &[
            ("id", "id", ColumnKind::Scalar),
            ("unit_price", "price", ColumnKind::Scalar),
            ("category", "category", ColumnKind::Scalar),
            ("tags", "tags", ColumnKind::Array),
        ],
    };

    #[test]
    fn test_base_select_aliases_columns() {
        let compiled = Pipeline::new().compile(&ITEMS).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT to_jsonb(r) AS doc FROM (SELECT id AS \"id\", unit_price AS \"price\", category AS \"category\", tags AS \"tags\" FROM items) AS r"
        );
        assert!(compiled.binds.is_empty());
    }

    #[test]
    fn test_match_binds_in_order() {
        let compiled = Pipeline::new()
            .filter(Filter::new().ne("category", "toys"))
            .filter(Filter::new().gte("price", 10.0))
            .compile(&ITEMS)
            .unwrap();

        assert!(compiled
            .sql
            .contains("AS s0 WHERE s0.\"category\" IS DISTINCT FROM $1"));
        assert!(compiled.sql.contains("AS s1 WHERE s1.\"price\" >= $2"));
        assert_eq!(
            compiled.binds,
            vec![FilterValue::Text("toys".into()), FilterValue::Float(10.0)]
        );
    }

    #[test]
    fn test_group_then_sort_and_limit() {
        let compiled = Pipeline::new()
            .group(
                Group::by(GroupKey::Upper("category".into()))
                    .field("count", Accumulator::Count)
                    .field("avgPrice", Accumulator::Avg("price".into())),
            )
            .sort("avgPrice", Direction::Desc)
            .limit(3)
            .compile(&ITEMS)
            .unwrap();

        assert!(compiled.sql.contains(
            "SELECT upper(s0.\"category\"::text) AS \"_id\", COUNT(*) AS \"count\", AVG(s0.\"price\") AS \"avgPrice\""
        ));
        assert!(compiled.sql.contains("GROUP BY 1"));
        assert!(compiled
            .sql
            .contains("AS s2 ORDER BY \"avgPrice\" DESC LIMIT 3"));
        assert!(compiled.sql.ends_with("AS r ORDER BY \"avgPrice\" DESC"));
    }

    #[test]
    fn test_fields_are_checked_per_stage() {
        // `price` no longer exists after grouping
        let err = Pipeline::new()
            .group(Group::by(GroupKey::Field("category".into())).field("n", Accumulator::Count))
            .filter(Filter::new().gte("price", 1.0))
            .compile(&ITEMS)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(Pipeline::new()
            .sort("nope", Direction::Asc)
            .compile(&ITEMS)
            .is_err());
    }

    #[test]
    fn test_identifiers_cannot_inject() {
        let err = Pipeline::new()
            .group(Group::by(GroupKey::All).field("x\" FROM pg_user --", Accumulator::Count))
            .compile(&ITEMS)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_unwind_requires_array() {
        assert!(Pipeline::new().unwind("category").compile(&ITEMS).is_err());

        let compiled = Pipeline::new()
            .unwind("tags")
            .group(Group::by(GroupKey::Field("tags".into())).field("n", Accumulator::Count))
            .compile(&ITEMS)
            .unwrap();
        assert!(compiled
            .sql
            .contains("CROSS JOIN LATERAL unnest(s0.\"tags\") AS u0(v)"));
        assert!(compiled.sql.contains("u0.v AS \"tags\""));
    }

    #[test]
    fn test_project_and_add_field() {
        let compiled = Pipeline::new()
            .group(Group::by(GroupKey::Field("category".into())).field("n", Accumulator::Count))
            .add_field("category", "_id")
            .project(&["category", "n"])
            .compile(&ITEMS)
            .unwrap();
        assert!(compiled
            .sql
            .contains("SELECT s1.*, s1.\"_id\" AS \"category\""));
        assert!(compiled.sql.contains("SELECT s2.\"category\", s2.\"n\""));

        assert!(Pipeline::new()
            .add_field("price", "id")
            .compile(&ITEMS)
            .is_err());
    }

    #[test]
    fn test_prepend() {
        let pipeline = Pipeline::new()
            .limit(1)
            .prepend(Stage::Match(Filter::new()));
        assert!(matches!(pipeline.first(), Some(Stage::Match(_))));
        assert_eq!(pipeline.stages().len(), 2);
    }
}
