//! SQL rendering of typed filters

use sqlx::{Postgres, QueryBuilder};

use crate::models::filter::{Direction, Filter, FilterValue};

/// Bind a filter value onto the builder
pub fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &FilterValue) {
    match value.clone() {
        FilterValue::Bool(v) => qb.push_bind(v),
        FilterValue::Int(v) => qb.push_bind(v),
        FilterValue::Float(v) => qb.push_bind(v),
        FilterValue::Text(v) => qb.push_bind(v),
        FilterValue::Timestamp(v) => qb.push_bind(v),
    };
}

/// Append ` AND column op $n` for every condition.
///
/// Condition fields must be trusted column names, values are always bound.
pub fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    for condition in &filter.conditions {
        qb.push(" AND ")
            .push(&condition.field)
            .push(" ")
            .push(condition.op.as_sql())
            .push(" ");
        push_value(qb, &condition.value);
    }
}

/// Append ` ORDER BY ...` with `id` as the final tie breaker
pub fn push_order_by(qb: &mut QueryBuilder<'_, Postgres>, sort: &[(String, Direction)]) {
    qb.push(" ORDER BY ");
    for (column, direction) in sort {
        qb.push(column).push(" ").push(direction.as_sql()).push(", ");
    }
    qb.push("id");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::filter::CompareOp;

    #[test]
    fn test_conditions_are_bound() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM tours WHERE NOT secret_tour");
        let filter = Filter::new()
            .with("price", CompareOp::Lt, 1500.0)
            .eq("difficulty", "easy'; DROP TABLE tours; --");
        push_conditions(&mut qb, &filter);
        push_order_by(&mut qb, &[("price".to_string(), Direction::Desc)]);

        assert_eq!(
            qb.sql(),
            "SELECT * FROM tours WHERE NOT secret_tour AND price < $1 AND difficulty = $2 ORDER BY price DESC, id"
        );
    }
}
