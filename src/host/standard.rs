use super::backend::{Backend, StandardRoutines};
use super::types::{
    DestKind, DestReceiver, ExecFlags, ExecutorPhase, ParamList, ProcessUtilityContext, QueryDesc,
    ScanDirection, UtilityStmt,
};
use crate::{HostError, HostResult};
use tracing::trace;

/// In-process stand-in for the executor and utility processor.
///
/// Plans carry their own row counts and failures, so statements behave
/// predictably without storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedExecutor;

fn expect_phase(query_desc: &QueryDesc, expected: ExecutorPhase, routine: &str) -> HostResult<()> {
    if query_desc.phase != expected {
        return Err(HostError::internal(format!(
            "{} called in phase {:?}, expected {:?}",
            routine, query_desc.phase, expected
        )));
    }
    Ok(())
}

impl StandardRoutines for SimulatedExecutor {
    fn executor_start(
        &self,
        _backend: &Backend,
        query_desc: &mut QueryDesc,
        _eflags: ExecFlags,
    ) -> HostResult<()> {
        expect_phase(query_desc, ExecutorPhase::Created, "ExecutorStart")?;
        query_desc.phase = ExecutorPhase::Started;
        Ok(())
    }

    fn executor_run(
        &self,
        _backend: &Backend,
        query_desc: &mut QueryDesc,
        direction: ScanDirection,
        count: u64,
    ) -> HostResult<()> {
        expect_phase(query_desc, ExecutorPhase::Started, "ExecutorRun")?;
        if let Some(err) = &query_desc.plan.error {
            return Err(err.clone());
        }

        let rows = match direction {
            ScanDirection::NoMovement => 0,
            _ if count == 0 => query_desc.plan.rows,
            _ => count.min(query_desc.plan.rows),
        };
        trace!(rows, ?direction, "ExecutorRun");
        query_desc.processed = query_desc.processed.saturating_add(rows);
        query_desc.dest.receive(rows);
        Ok(())
    }

    fn executor_finish(&self, _backend: &Backend, query_desc: &mut QueryDesc) -> HostResult<()> {
        expect_phase(query_desc, ExecutorPhase::Started, "ExecutorFinish")?;
        query_desc.phase = ExecutorPhase::Finished;
        Ok(())
    }

    fn executor_end(&self, _backend: &Backend, query_desc: &mut QueryDesc) -> HostResult<()> {
        if query_desc.phase == ExecutorPhase::Created || query_desc.phase == ExecutorPhase::Ended {
            return Err(HostError::internal(format!(
                "ExecutorEnd called in phase {:?}",
                query_desc.phase
            )));
        }
        query_desc.phase = ExecutorPhase::Ended;
        Ok(())
    }

    fn process_utility(
        &self,
        backend: &Backend,
        stmt: &UtilityStmt,
        query_string: &str,
        _context: ProcessUtilityContext,
        params: Option<&ParamList>,
        _dest: &mut DestReceiver,
        completion_tag: &mut String,
    ) -> HostResult<()> {
        match stmt {
            UtilityStmt::Command { tag } => {
                *completion_tag = tag.clone();
            }
            UtilityStmt::Do { body } => {
                for statement in body {
                    backend.run_statement(statement, ProcessUtilityContext::Query)?;
                }
                *completion_tag = "DO".to_string();
            }
            UtilityStmt::CreateTableAs { relation, query } => {
                let mut query_desc = QueryDesc::new(
                    query.clone(),
                    query_string,
                    params.cloned(),
                    DestReceiver::new(DestKind::Tuplestore),
                );
                backend.execute(&mut query_desc, ExecFlags::NONE)?;
                trace!(relation = %relation, rows = query_desc.processed, "created table");
                *completion_tag = format!("SELECT {}", query_desc.processed);
            }
            UtilityStmt::VariableSet { name, value } => {
                backend.set_config(name, value.as_deref()).map_err(HostError::from)?;
                *completion_tag = if value.is_some() { "SET" } else { "RESET" }.to_string();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::types::{CmdType, PlannedQuery, Statement};

    fn query_desc(rows: u64) -> QueryDesc {
        QueryDesc::new(
            PlannedQuery::new(CmdType::Select, rows),
            "SELECT * FROM t",
            None,
            DestReceiver::new(DestKind::Remote),
        )
    }

    #[test]
    fn test_run_respects_count_and_direction() {
        let backend = Backend::simulated();
        let mut qd = query_desc(10);
        backend.executor_start(&mut qd, ExecFlags::NONE).unwrap();

        backend.executor_run(&mut qd, ScanDirection::Forward, 3).unwrap();
        assert_eq!(qd.processed, 3);

        backend.executor_run(&mut qd, ScanDirection::NoMovement, 0).unwrap();
        assert_eq!(qd.processed, 3);

        backend.executor_run(&mut qd, ScanDirection::Forward, 0).unwrap();
        assert_eq!(qd.processed, 13);
        assert_eq!(qd.dest.received, 13);
    }

    #[test]
    fn test_repeated_runs_saturate_row_counts() {
        let backend = Backend::simulated();
        let mut qd = query_desc(u64::MAX);
        backend.executor_start(&mut qd, ExecFlags::NONE).unwrap();

        backend.executor_run(&mut qd, ScanDirection::Forward, 1).unwrap();
        backend.executor_run(&mut qd, ScanDirection::Forward, 0).unwrap();

        assert_eq!(qd.processed, u64::MAX);
        assert_eq!(qd.dest.received, u64::MAX);
        backend.executor_finish(&mut qd).unwrap();
    }

    #[test]
    fn test_run_before_start_is_internal_error() {
        let backend = Backend::simulated();
        let mut qd = query_desc(1);

        let err = backend.executor_run(&mut qd, ScanDirection::Forward, 0).unwrap_err();
        assert_eq!(err.sqlstate, "XX000");
        assert!(err.message.contains("ExecutorRun"));
    }

    #[test]
    fn test_create_table_as_reports_row_count() {
        let backend = Backend::simulated();
        let statement = Statement::utility(
            "CREATE TABLE t2 AS SELECT * FROM t",
            UtilityStmt::CreateTableAs {
                relation: "t2".to_string(),
                query: PlannedQuery::new(CmdType::Select, 42),
            },
        );

        let tag = backend.exec_simple_query(&statement).unwrap();
        assert_eq!(tag, "SELECT 42");
    }

    #[test]
    fn test_do_block_stops_at_first_failure() {
        let backend = Backend::simulated();
        let statement = Statement::utility(
            "DO $$ ... $$",
            UtilityStmt::Do {
                body: vec![
                    Statement::query(
                        "SELECT 1/0",
                        PlannedQuery::failing(
                            CmdType::Select,
                            HostError::new("22012", "division by zero"),
                        ),
                    ),
                    Statement::utility(
                        "SET x = 1",
                        UtilityStmt::VariableSet {
                            name: "x".to_string(),
                            value: Some("1".to_string()),
                        },
                    ),
                ],
            },
        );

        let err = backend.exec_simple_query(&statement).unwrap_err();
        assert_eq!(err.sqlstate, "22012");
    }

    #[test]
    fn test_set_unknown_setting_raises_undefined_object() {
        let backend = Backend::simulated();
        let statement = Statement::utility(
            "SET no.such = on",
            UtilityStmt::VariableSet {
                name: "no.such".to_string(),
                value: Some("on".to_string()),
            },
        );

        let err = backend.exec_simple_query(&statement).unwrap_err();
        assert_eq!(err.sqlstate, "42704");
    }
}
