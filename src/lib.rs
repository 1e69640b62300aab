use pgrx::prelude::*;

pg_module_magic!();

mod accum;
mod error;
mod final_fn;
mod helpers;
mod median;
mod parallel;
mod state;
mod value;

// Re-export all pg_extern functions so pgrx can discover them
pub use accum::median_transfn;
pub use final_fn::{
    median_final_float4, median_final_float8, median_final_int2, median_final_int4,
    median_final_int8, median_final_text, median_final_timestamptz,
};
pub use parallel::{median_combine, median_deserial, median_serial};

pub use error::MedianError;
pub use median::{finalize, median_index};
pub use state::MedianState;
pub use value::{Kind, Value};

// Aggregate definitions using extension_sql!
// These must come after all function definitions (enforced by `requires`).
// Every overload shares the one polymorphic sfunc; only the finalfunc differs.
extension_sql!(
    r#"
CREATE AGGREGATE median(bigint) (
    sfunc = median_transfn,
    stype = internal,
    finalfunc = median_final_int8,
    combinefunc = median_combine,
    serialfunc = median_serial,
    deserialfunc = median_deserial,
    parallel = safe
);

CREATE AGGREGATE median(integer) (
    sfunc = median_transfn,
    stype = internal,
    finalfunc = median_final_int4,
    combinefunc = median_combine,
    serialfunc = median_serial,
    deserialfunc = median_deserial,
    parallel = safe
);

CREATE AGGREGATE median(smallint) (
    sfunc = median_transfn,
    stype = internal,
    finalfunc = median_final_int2,
    combinefunc = median_combine,
    serialfunc = median_serial,
    deserialfunc = median_deserial,
    parallel = safe
);

CREATE AGGREGATE median(real) (
    sfunc = median_transfn,
    stype = internal,
    finalfunc = median_final_float4,
    combinefunc = median_combine,
    serialfunc = median_serial,
    deserialfunc = median_deserial,
    parallel = safe
);

CREATE AGGREGATE median(double precision) (
    sfunc = median_transfn,
    stype = internal,
    finalfunc = median_final_float8,
    combinefunc = median_combine,
    serialfunc = median_serial,
    deserialfunc = median_deserial,
    parallel = safe
);

CREATE AGGREGATE median(text) (
    sfunc = median_transfn,
    stype = internal,
    finalfunc = median_final_text,
    combinefunc = median_combine,
    serialfunc = median_serial,
    deserialfunc = median_deserial,
    parallel = safe
);

CREATE AGGREGATE median(timestamptz) (
    sfunc = median_transfn,
    stype = internal,
    finalfunc = median_final_timestamptz,
    combinefunc = median_combine,
    serialfunc = median_serial,
    deserialfunc = median_deserial,
    parallel = safe
);
"#,
    name = "aggregates",
    requires = [
        median_transfn,
        median_final_int8,
        median_final_int4,
        median_final_int2,
        median_final_float4,
        median_final_float8,
        median_final_text,
        median_final_timestamptz,
        median_combine,
        median_serial,
        median_deserial
    ]
);

#[cfg(any(test, feature = "pg_test"))]
#[pg_schema]
mod tests {
    use pgrx::prelude::*;

    #[pg_test]
    fn test_extension_loads() {
        // Verify the extension loaded successfully
        let result = Spi::get_one::<bool>("SELECT true");
        assert_eq!(result, Ok(Some(true)));
    }

    // ── one test per overload ──

    #[pg_test]
    fn test_median_int4_odd() {
        let result = Spi::get_one::<i32>("SELECT median(x) FROM (VALUES (5), (1), (3)) AS t(x)");
        assert_eq!(result, Ok(Some(3)));
    }

    #[pg_test]
    fn test_median_int8_even_takes_upper_middle() {
        let result = Spi::get_one::<i64>(
            "SELECT median(x) FROM (VALUES (1::bigint), (2), (3), (4)) AS t(x)",
        );
        assert_eq!(result, Ok(Some(3)));
    }

    #[pg_test]
    fn test_median_int2() {
        let result = Spi::get_one::<i16>(
            "SELECT median(x) FROM (VALUES (-7::smallint), (100), (8), (8), (-1)) AS t(x)",
        );
        assert_eq!(result, Ok(Some(8)));
    }

    #[pg_test]
    fn test_median_float4_nan_sorts_last() {
        let result = Spi::get_one::<f32>(
            "SELECT median(x) FROM unnest(ARRAY['NaN', 0.5, 1.5]::real[]) AS t(x)",
        );
        assert_eq!(result, Ok(Some(1.5)));
    }

    #[pg_test]
    fn test_median_float8() {
        let result = Spi::get_one::<f64>(
            "SELECT median(x) FROM unnest(ARRAY[2.25, -1e10, 'Infinity', 0]::float8[]) AS t(x)",
        );
        assert_eq!(result, Ok(Some(2.25)));
    }

    #[pg_test]
    fn test_median_text() {
        let result = Spi::get_one::<String>(
            "SELECT median(x) FROM (VALUES ('banana'::text), ('apple'), ('cherry')) AS t(x)",
        );
        assert_eq!(result, Ok(Some("banana".to_string())));
    }

    #[pg_test]
    fn test_median_timestamptz() {
        let result = Spi::get_one::<bool>(
            "SELECT median(x) = '2024-01-02 12:00:00+00'::timestamptz
             FROM (VALUES ('2024-01-03 00:00:00+00'::timestamptz),
                          ('2024-01-01 00:00:00+00'),
                          ('2024-01-02 12:00:00+00')) AS t(x)",
        );
        assert_eq!(result, Ok(Some(true)));
    }

    #[pg_test]
    fn test_median_single_value() {
        let result = Spi::get_one::<String>("SELECT median('only'::text)");
        assert_eq!(result, Ok(Some("only".to_string())));
    }

    // ── NULL and empty groups ──

    #[pg_test]
    fn test_nulls_are_skipped() {
        let result = Spi::get_one::<i32>(
            "SELECT median(x) FROM (VALUES (1), (NULL), (3), (NULL), (2)) AS t(x)",
        );
        assert_eq!(result, Ok(Some(2)));
    }

    #[pg_test]
    fn test_all_null_group_is_null() {
        let result = Spi::get_one::<i32>(
            "SELECT median(x) FROM (VALUES (NULL::int), (NULL)) AS t(x)",
        );
        assert_eq!(result, Ok(None));
    }

    #[pg_test]
    fn test_empty_input_is_null() {
        let result = Spi::get_one::<f64>(
            "SELECT median(x::float8) FROM generate_series(1, 0) AS t(x)",
        );
        assert_eq!(result, Ok(None));
    }

    // ── aggregation lifecycle ──

    #[pg_test]
    fn test_groups_do_not_share_state() {
        let result = Spi::get_one::<String>(
            "SELECT string_agg(g || ':' || m, ',' ORDER BY g)
             FROM (
                 SELECT g, median(v) AS m
                 FROM (VALUES (1, 10), (2, 5), (1, 30), (2, 1), (1, 20), (3, NULL::int)) AS t(g, v)
                 GROUP BY g
             ) s
             WHERE m IS NOT NULL",
        );
        assert_eq!(result, Ok(Some("1:20,2:5".to_string())));
    }

    #[pg_test]
    fn test_running_window_finalizes_repeatedly() {
        // The finalfunc runs once per row against the same growing state.
        let result = Spi::get_one::<Vec<i32>>(
            "SELECT array_agg(m ORDER BY i)
             FROM (
                 SELECT i, median(v) OVER (ORDER BY i) AS m
                 FROM (VALUES (1, 5), (2, 1), (3, 3), (4, 4)) AS t(i, v)
             ) s",
        );
        assert_eq!(result, Ok(Some(vec![5, 5, 3, 4])));
    }

    #[pg_test(
        error = "pg_median: unsupported input type (oid 1700). Expected: int8, int4, int2, float4, float8, text, timestamptz"
    )]
    fn test_unsupported_type_errors() {
        Spi::run(
            "CREATE AGGREGATE median_numeric(numeric) (
                sfunc = median_transfn,
                stype = internal,
                finalfunc = median_final_float8
            )",
        )
        .unwrap();
        Spi::run("SELECT median_numeric(x) FROM (VALUES (1.5::numeric)) AS t(x)").unwrap();
    }

    #[pg_test(
        error = "pg_median: final function returns text but the aggregation holds int4 values"
    )]
    fn test_mismatched_finalfunc_errors() {
        Spi::run(
            "CREATE AGGREGATE median_int_as_text(integer) (
                sfunc = median_transfn,
                stype = internal,
                finalfunc = median_final_text
            )",
        )
        .unwrap();
        Spi::run("SELECT median_int_as_text(x) FROM (VALUES (1), (2)) AS t(x)").unwrap();
    }

    #[pg_test(error = "pg_median: median_transfn called in non-aggregate context")]
    fn test_transfn_outside_aggregate_errors() {
        Spi::run("SELECT median_transfn(NULL, 1)").unwrap();
    }

    #[pg_test(error = "pg_median: median_final_int8 called in non-aggregate context")]
    fn test_finalfunc_outside_aggregate_errors() {
        Spi::run("SELECT median_final_int8(NULL)").unwrap();
    }

    // ── agreement with a plain-SQL reference ──

    fn matches_reference(table: &str, order_by: &str) -> Option<bool> {
        Spi::get_one::<bool>(&format!(
            "SELECT (SELECT median(v) FROM {table})
                  = (SELECT v FROM {table} ORDER BY {order_by}
                     OFFSET (SELECT count(v) / 2 FROM {table}) LIMIT 1)"
        ))
        .unwrap()
    }

    #[pg_test]
    fn test_int_matches_reference() {
        Spi::run(
            "CREATE TEMP TABLE med_odd AS
             SELECT floor(random() * 1000)::int AS v FROM generate_series(1, 2001);
             CREATE TEMP TABLE med_even AS
             SELECT floor(random() * 1000)::int AS v FROM generate_series(1, 2000)",
        )
        .unwrap();
        assert_eq!(matches_reference("med_odd", "v"), Some(true));
        assert_eq!(matches_reference("med_even", "v"), Some(true));
    }

    #[pg_test]
    fn test_text_matches_reference() {
        Spi::run(
            "CREATE TEMP TABLE med_text AS
             SELECT substr(md5(random()::text), 1, 4) AS v FROM generate_series(1, 1500)",
        )
        .unwrap();
        assert_eq!(matches_reference("med_text", "v COLLATE \"C\""), Some(true));
    }

    #[pg_test]
    fn test_parallel_plan_matches_reference() {
        Spi::run(
            "CREATE TABLE med_parallel AS
             SELECT (random() * 1e6)::float8 AS v FROM generate_series(1, 100000);
             ANALYZE med_parallel;
             SET LOCAL parallel_setup_cost = 0;
             SET LOCAL parallel_tuple_cost = 0;
             SET LOCAL min_parallel_table_scan_size = 0;
             SET LOCAL max_parallel_workers_per_gather = 2;
             CREATE FUNCTION pg_temp.plan_of(q text) RETURNS text
             LANGUAGE plpgsql AS $$
             DECLARE
                 row_text text;
                 plan text := '';
             BEGIN
                 FOR row_text IN EXECUTE 'EXPLAIN (COSTS OFF) ' || q LOOP
                     plan := plan || row_text || E'\n';
                 END LOOP;
                 RETURN plan;
             END $$",
        )
        .unwrap();

        // Partial Aggregate below a Gather means the states went through
        // median_serial, median_deserial and median_combine.
        let plan = Spi::get_one::<String>(
            "SELECT pg_temp.plan_of('SELECT median(v) FROM med_parallel')",
        )
        .unwrap()
        .unwrap();
        assert!(plan.contains("Partial Aggregate"), "no partial aggregate in plan:\n{plan}");
        assert!(plan.contains("Gather"), "no gather in plan:\n{plan}");

        assert_eq!(matches_reference("med_parallel", "v"), Some(true));
    }
}

#[cfg(test)]
pub mod pg_test {
    pub fn setup(_options: Vec<&str>) {}

    pub fn postgresql_conf_options() -> Vec<&'static str> {
        vec![]
    }
}
