use std::path::{Path, PathBuf};
use std::process::Command;

use shared_types::{ContactsError, ContactsResult, Group};

use super::{MemberIdentity, RemovalChannel, RemovalStrategy};

/// One external interpreter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs script invocations. Failing to start the interpreter is an error;
/// a non-zero exit is reported through `ScriptOutcome::success`.
pub trait ScriptRunner {
    fn run(&self, invocation: &ScriptInvocation) -> ContactsResult<ScriptOutcome>;
}

/// Runs invocations as child processes and waits for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ScriptRunner for ProcessRunner {
    fn run(&self, invocation: &ScriptInvocation) -> ContactsResult<ScriptOutcome> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .output()
            .map_err(|e| {
                ContactsError::store(format!("failed to run {}: {}", invocation.program, e))
            })?;

        Ok(ScriptOutcome {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Script language spoken by a removal channel.
pub trait ScriptDialect {
    fn name(&self) -> &'static str;

    /// Builds the invocation for one strategy, or `None` when the strategy
    /// cannot address this group/member (for example a nameless person).
    fn invocation(
        &self,
        strategy: RemovalStrategy,
        group: &Group,
        member: &MemberIdentity,
    ) -> Option<ScriptInvocation>;
}

/// AppleScript run through `osascript` against Contacts.app.
#[derive(Debug, Clone)]
pub struct AppleScript {
    program: String,
}

impl Default for AppleScript {
    fn default() -> Self {
        Self::new("osascript")
    }
}

impl AppleScript {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn quote(value: &str) -> String {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }

    fn script(&self, strategy: RemovalStrategy, group: &Group, member: &MemberIdentity) -> Option<String> {
        let (group_clause, person_clause) = match strategy {
            RemovalStrategy::GroupId => (
                format!("first group whose id is {}", Self::quote(group.id())),
                format!("first person whose id is {}", Self::quote(&member.id)),
            ),
            RemovalStrategy::GroupName => {
                if group.name.trim().is_empty() {
                    return None;
                }
                (
                    format!("first group whose name is {}", Self::quote(&group.name)),
                    format!("first person whose id is {}", Self::quote(&member.id)),
                )
            }
            RemovalStrategy::PersonName => {
                if group.name.trim().is_empty() || !member.has_name() {
                    return None;
                }
                (
                    format!("first group whose name is {}", Self::quote(&group.name)),
                    format!(
                        "first person of g whose first name is {} and last name is {}",
                        Self::quote(&member.given_name),
                        Self::quote(&member.family_name)
                    ),
                )
            }
        };

        Some(format!(
            "tell application \"Contacts\"\n\
             \tset g to {}\n\
             \tset p to {}\n\
             \tremove p from g\n\
             \tsave\n\
             end tell",
            group_clause, person_clause
        ))
    }
}

impl ScriptDialect for AppleScript {
    fn name(&self) -> &'static str {
        "osascript"
    }

    fn invocation(
        &self,
        strategy: RemovalStrategy,
        group: &Group,
        member: &MemberIdentity,
    ) -> Option<ScriptInvocation> {
        let script = self.script(strategy, group, member)?;
        Some(ScriptInvocation {
            program: self.program.clone(),
            args: vec!["-e".to_string(), script],
        })
    }
}

/// SQL run through the `sqlite3` shell against a `SqliteStore` database.
#[derive(Debug, Clone)]
pub struct SqliteShell {
    program: String,
    db_path: PathBuf,
}

impl SqliteShell {
    pub fn new(program: impl Into<String>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn quote(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn sql(strategy: RemovalStrategy, group: &Group, member: &MemberIdentity) -> Option<String> {
        match strategy {
            RemovalStrategy::GroupId => Some(format!(
                "DELETE FROM group_members WHERE group_id = {} AND contact_id = {};",
                Self::quote(group.id()),
                Self::quote(&member.id)
            )),
            RemovalStrategy::GroupName => {
                if group.name.trim().is_empty() {
                    return None;
                }
                Some(format!(
                    "DELETE FROM group_members WHERE contact_id = {} AND group_id IN \
                     (SELECT id FROM contact_groups WHERE name = {});",
                    Self::quote(&member.id),
                    Self::quote(&group.name)
                ))
            }
            RemovalStrategy::PersonName => {
                if group.name.trim().is_empty() || !member.has_name() {
                    return None;
                }
                Some(format!(
                    "DELETE FROM group_members WHERE group_id IN \
                     (SELECT id FROM contact_groups WHERE name = {group}) AND contact_id IN \
                     (SELECT c.id FROM contacts c \
                     INNER JOIN group_members gm ON gm.contact_id = c.id \
                     INNER JOIN contact_groups g ON g.id = gm.group_id \
                     WHERE g.name = {group} AND c.given_name = {given} AND c.family_name = {family} \
                     LIMIT 1);",
                    group = Self::quote(&group.name),
                    given = Self::quote(&member.given_name),
                    family = Self::quote(&member.family_name)
                ))
            }
        }
    }
}

impl ScriptDialect for SqliteShell {
    fn name(&self) -> &'static str {
        "sqlite3"
    }

    fn invocation(
        &self,
        strategy: RemovalStrategy,
        group: &Group,
        member: &MemberIdentity,
    ) -> Option<ScriptInvocation> {
        let sql = Self::sql(strategy, group, member)?;
        Some(ScriptInvocation {
            program: self.program.clone(),
            args: vec![
                "-bail".to_string(),
                self.db_path.to_string_lossy().into_owned(),
                sql,
            ],
        })
    }
}

/// Removal channel that runs dialect scripts, falling back through
/// [`RemovalStrategy::ORDER`] until one exits successfully.
pub struct ScriptedRemover<D, R = ProcessRunner> {
    dialect: D,
    runner: R,
}

impl<D: ScriptDialect> ScriptedRemover<D, ProcessRunner> {
    pub fn new(dialect: D) -> Self {
        Self {
            dialect,
            runner: ProcessRunner,
        }
    }
}

impl<D: ScriptDialect, R: ScriptRunner> ScriptedRemover<D, R> {
    pub fn with_runner(dialect: D, runner: R) -> Self {
        Self { dialect, runner }
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }
}

impl<D: ScriptDialect, R: ScriptRunner> RemovalChannel for ScriptedRemover<D, R> {
    fn remove_member(&self, group: &Group, member: &MemberIdentity) -> ContactsResult<()> {
        let mut attempted = Vec::new();
        let mut last_failure = String::new();

        for strategy in RemovalStrategy::ORDER {
            let Some(invocation) = self.dialect.invocation(strategy, group, member) else {
                continue;
            };
            attempted.push(strategy.as_str());

            match self.runner.run(&invocation) {
                Ok(outcome) if outcome.success => {
                    tracing::debug!(
                        dialect = self.dialect.name(),
                        strategy = strategy.as_str(),
                        group_id = group.id(),
                        contact_id = %member.id,
                        "Scripted removal succeeded"
                    );
                    return Ok(());
                }
                Ok(outcome) => {
                    last_failure = if outcome.stderr.trim().is_empty() {
                        "script exited with failure".to_string()
                    } else {
                        outcome.stderr.trim().to_string()
                    };
                }
                Err(err) => last_failure = err.message,
            }

            tracing::debug!(
                dialect = self.dialect.name(),
                strategy = strategy.as_str(),
                error = %last_failure,
                "Scripted removal strategy failed"
            );
        }

        if attempted.is_empty() {
            return Err(ContactsError::store(format!(
                "{} removal has no applicable strategy for contact {} in group {}",
                self.dialect.name(),
                member.id,
                group.id()
            )));
        }

        Err(ContactsError::store(format!(
            "{} removal failed for contact {} in group {} (tried {}): {}",
            self.dialect.name(),
            member.id,
            group.id(),
            attempted.join(", "),
            last_failure
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{ErrorCode, GroupRef};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays canned outcomes and records every invocation.
    struct FakeRunner {
        outcomes: RefCell<VecDeque<ContactsResult<ScriptOutcome>>>,
        calls: RefCell<Vec<ScriptInvocation>>,
    }

    impl FakeRunner {
        fn new(outcomes: Vec<ContactsResult<ScriptOutcome>>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes.into()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ScriptRunner for &FakeRunner {
        fn run(&self, invocation: &ScriptInvocation) -> ContactsResult<ScriptOutcome> {
            self.calls.borrow_mut().push(invocation.clone());
            self.outcomes
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(ScriptOutcome::default()))
        }
    }

    fn ok() -> ContactsResult<ScriptOutcome> {
        Ok(ScriptOutcome {
            success: true,
            ..Default::default()
        })
    }

    fn failed(stderr: &str) -> ContactsResult<ScriptOutcome> {
        Ok(ScriptOutcome {
            success: false,
            stderr: stderr.to_string(),
            ..Default::default()
        })
    }

    fn group() -> Group {
        Group {
            group_ref: GroupRef::new("G1"),
            name: "Vendors".to_string(),
        }
    }

    fn member() -> MemberIdentity {
        MemberIdentity {
            id: "c-1".to_string(),
            given_name: "Priya".to_string(),
            family_name: "N.".to_string(),
        }
    }

    #[test]
    fn test_first_successful_strategy_wins() {
        let runner = FakeRunner::new(vec![ok()]);
        let remover = ScriptedRemover::with_runner(SqliteShell::new("sqlite3", "/tmp/c.db"), &runner);

        remover.remove_member(&group(), &member()).unwrap();
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn test_falls_back_to_next_strategy() {
        let runner = FakeRunner::new(vec![failed("no such group"), ok()]);
        let remover = ScriptedRemover::with_runner(AppleScript::default(), &runner);

        remover.remove_member(&group(), &member()).unwrap();
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].args[1].contains("whose id is \"G1\""));
        assert!(calls[1].args[1].contains("whose name is \"Vendors\""));
    }

    #[test]
    fn test_all_strategies_failing_is_store_error() {
        let runner = FakeRunner::new(vec![
            failed("a"),
            Err(ContactsError::store("spawn failed")),
            failed("person not found"),
        ]);
        let remover = ScriptedRemover::with_runner(AppleScript::default(), &runner);

        let err = remover.remove_member(&group(), &member()).unwrap_err();
        assert_eq!(err.code, ErrorCode::Store);
        assert!(err.message.contains("group_id, group_name, person_name"));
        assert!(err.message.ends_with("person not found"));
    }

    #[test]
    fn test_nameless_member_skips_person_strategy() {
        let runner = FakeRunner::new(vec![failed("x"), failed("y")]);
        let remover = ScriptedRemover::with_runner(AppleScript::default(), &runner);

        let err = remover
            .remove_member(&group(), &MemberIdentity::new("c-1"))
            .unwrap_err();
        assert_eq!(runner.calls.borrow().len(), 2);
        assert!(err.message.contains("(tried group_id, group_name)"));
    }

    #[test]
    fn test_applescript_escapes_quotes() {
        let group = Group {
            group_ref: GroupRef::new("G\"1"),
            name: "A \\ B".to_string(),
        };
        let invocation = AppleScript::default()
            .invocation(RemovalStrategy::GroupName, &group, &member())
            .unwrap();
        assert_eq!(invocation.program, "osascript");
        assert_eq!(invocation.args[0], "-e");
        assert!(invocation.args[1].contains("whose name is \"A \\\\ B\""));

        let invocation = AppleScript::default()
            .invocation(RemovalStrategy::GroupId, &group, &member())
            .unwrap();
        assert!(invocation.args[1].contains("whose id is \"G\\\"1\""));
    }

    #[test]
    fn test_sqlite_shell_doubles_single_quotes() {
        let member = MemberIdentity {
            id: "c-1".to_string(),
            given_name: "Seán".to_string(),
            family_name: "O'Brien".to_string(),
        };
        let invocation = SqliteShell::new("sqlite3", "/tmp/c.db")
            .invocation(RemovalStrategy::PersonName, &group(), &member)
            .unwrap();
        assert_eq!(invocation.args[0], "-bail");
        assert_eq!(invocation.args[1], "/tmp/c.db");
        assert!(invocation.args[2].contains("c.family_name = 'O''Brien'"));
    }
}
