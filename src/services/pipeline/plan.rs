use super::types::{Capture, Stage, Step, StepAction, StepPolicy};
use crate::config::FailurePolicy;
use crate::services::dependencies::{DependencyReport, Tool};
use crate::services::job::JobPaths;
use crate::services::runner::Invocation;
use std::ffi::OsString;
use std::fmt::Write as _;
use std::path::Path;

const EXIT_OK: &[i32] = &[0];
/// qpdf exits with 3 when it succeeded with warnings
const QPDF_OK: &[i32] = &[0, 3];

/// Ordered, typed sequence of steps that cleans one job's upload
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    pub steps: Vec<Step>,
    dir: std::path::PathBuf,
}

impl PipelinePlan {
    pub fn build(paths: &JobPaths, deps: &DependencyReport, policy: FailurePolicy) -> Self {
        let dir = paths.dir().to_path_buf();
        let cleaning = match policy {
            FailurePolicy::Strict => StepPolicy::Propagate,
            FailurePolicy::Lenient => StepPolicy::Suppress,
        };

        let tool = |tool: Tool, args: Vec<OsString>| Invocation {
            tool,
            program: deps.program(tool),
            args,
            current_dir: dir.clone(),
        };
        let input = os(paths.input_name());
        let cleaned = os(paths.cleaned_name());
        let linearized = os(paths.linearized_name());

        let steps = vec![
            Step {
                stage: Stage::Preflight,
                policy: StepPolicy::Propagate,
                on_error: "Input file missing",
                action: StepAction::RequireInput(paths.input()),
            },
            // Step 1: document information dictionary
            Step {
                stage: Stage::StripInfo,
                policy: cleaning,
                on_error: "Error in dumping data",
                action: StepAction::Run {
                    invocation: tool(Tool::Pdftk, vec![input.clone(), os("dump_data")]),
                    stdout_to: Some(Capture::Truncate(paths.original_metadata())),
                    ok_codes: EXIT_OK,
                },
            },
            Step {
                stage: Stage::StripInfo,
                policy: cleaning,
                on_error: "Error in rewriting metadata",
                action: StepAction::BlankMetadata {
                    from: paths.original_metadata(),
                    to: paths.modified_metadata(),
                },
            },
            Step {
                stage: Stage::StripInfo,
                policy: cleaning,
                on_error: "Error in updating info",
                action: StepAction::Run {
                    invocation: tool(
                        Tool::Pdftk,
                        vec![
                            input.clone(),
                            os("update_info"),
                            os(paths.modified_metadata_name()),
                            os("output"),
                            cleaned.clone(),
                        ],
                    ),
                    stdout_to: None,
                    ok_codes: EXIT_OK,
                },
            },
            // Step 2: tag metadata, then whatever is embedded in images and attachments
            Step {
                stage: Stage::StripEmbedded,
                policy: cleaning,
                on_error: "Error in exiftool command 1",
                action: StepAction::Run {
                    invocation: tool(
                        Tool::Exiftool,
                        vec![os("-all:all="), os("-overwrite_original"), cleaned.clone()],
                    ),
                    stdout_to: None,
                    ok_codes: EXIT_OK,
                },
            },
            Step {
                stage: Stage::StripEmbedded,
                policy: cleaning,
                on_error: "Error in embedded metadata scrub",
                action: StepAction::ScrubEmbedded(paths.cleaned()),
            },
            // Tag listings for the transcript only
            Step {
                stage: Stage::StripEmbedded,
                policy: StepPolicy::Suppress,
                on_error: "Error in exiftool command 2",
                action: StepAction::Run {
                    invocation: tool(Tool::Exiftool, vec![os("-all:all"), cleaned.clone()]),
                    stdout_to: None,
                    ok_codes: EXIT_OK,
                },
            },
            Step {
                stage: Stage::StripEmbedded,
                policy: StepPolicy::Suppress,
                on_error: "Error in exiftool command 3",
                action: StepAction::Run {
                    invocation: tool(
                        Tool::Exiftool,
                        vec![os("-extractEmbedded"), os("-all:all"), cleaned.clone()],
                    ),
                    stdout_to: None,
                    ok_codes: EXIT_OK,
                },
            },
            // Step 3
            Step {
                stage: Stage::Linearize,
                policy: cleaning,
                on_error: "Error in qpdf command",
                action: StepAction::Run {
                    invocation: tool(
                        Tool::Qpdf,
                        vec![os("--linearize"), cleaned.clone(), linearized.clone()],
                    ),
                    stdout_to: None,
                    ok_codes: QPDF_OK,
                },
            },
            // Step 4: diagnostics only, never gates the job
            Step {
                stage: Stage::Verify,
                policy: StepPolicy::Suppress,
                on_error: "Error in final dump_data",
                action: StepAction::Run {
                    invocation: tool(Tool::Pdftk, vec![linearized.clone(), os("dump_data")]),
                    stdout_to: Some(Capture::Truncate(paths.verification())),
                    ok_codes: EXIT_OK,
                },
            },
            Step {
                stage: Stage::Verify,
                policy: StepPolicy::Suppress,
                on_error: "Error in final exiftool",
                action: StepAction::Run {
                    invocation: tool(Tool::Exiftool, vec![linearized.clone()]),
                    stdout_to: Some(Capture::Append(paths.verification())),
                    ok_codes: EXIT_OK,
                },
            },
            Step {
                stage: Stage::Verify,
                policy: StepPolicy::Suppress,
                on_error: "Error in final pdfinfo",
                action: StepAction::Run {
                    invocation: tool(Tool::Pdfinfo, vec![os("-meta"), linearized]),
                    stdout_to: Some(Capture::Append(paths.verification())),
                    ok_codes: EXIT_OK,
                },
            },
            // Step 5: an unrenamed job must never reach the client
            Step {
                stage: Stage::Finalize,
                policy: StepPolicy::Propagate,
                on_error: "Error in mv command",
                action: StepAction::Rename {
                    from: paths.linearized(),
                    to: paths.input(),
                },
            },
            Step {
                stage: Stage::Finalize,
                policy: cleaning,
                on_error: "Error in cleanup",
                action: StepAction::Remove(vec![
                    paths.cleaned(),
                    paths.original_metadata(),
                    paths.modified_metadata(),
                ]),
            },
        ];

        Self { steps, dir }
    }

    /// Working directory of every step
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Shell rendering of the plan, kept next to a failed job for postmortem.
    ///
    /// Arguments are shell-quoted; the file is never executed by the
    /// service.
    pub fn render_script(&self) -> String {
        let mut script = String::from("#!/bin/bash\nset -e\nset -x\n\n");
        let _ = writeln!(script, "cd {}", quote_path(&self.dir));

        let mut stage = None;
        for step in &self.steps {
            if stage != Some(step.stage) {
                stage = Some(step.stage);
                let _ = writeln!(script, "\necho {}", quote(step.stage.banner()));
            }
            let command = render_action(&step.action, &self.dir);
            match step.policy {
                StepPolicy::Propagate => {
                    let _ = writeln!(script, "{}", command);
                }
                StepPolicy::Suppress => {
                    let _ = writeln!(script, "{} || echo {}", command, quote(step.on_error));
                }
            }
        }

        script.push_str("\necho 'Process completed successfully'\n");
        script
    }
}

/// One-line shell form of a step, also used as its transcript trace
pub fn render_action(action: &StepAction, dir: &Path) -> String {
    match action {
        StepAction::RequireInput(path) => format!("ls -l {}", relative(path, dir)),
        StepAction::Run {
            invocation,
            stdout_to,
            ..
        } => {
            let mut line = quote_path(&invocation.program);
            for arg in invocation.args_lossy() {
                line.push(' ');
                line.push_str(&quote(&arg));
            }
            match stdout_to {
                Some(Capture::Truncate(path)) => format!("{} > {}", line, relative(path, dir)),
                Some(Capture::Append(path)) => format!("{} >> {}", line, relative(path, dir)),
                None => line,
            }
        }
        StepAction::BlankMetadata { from, to } => format!(
            "sed -e 's/\\(InfoValue:\\)\\s.*/\\1 /' {} > {}",
            relative(from, dir),
            relative(to, dir)
        ),
        StepAction::ScrubEmbedded(path) => {
            format!(": embedded-scrub {}", relative(path, dir))
        }
        StepAction::Rename { from, to } => {
            format!("mv {} {}", relative(from, dir), relative(to, dir))
        }
        StepAction::Remove(paths) => {
            let names: Vec<String> = paths.iter().map(|p| relative(p, dir)).collect();
            format!("rm -f {}", names.join(" "))
        }
    }
}

/// Single-quote `arg` for a POSIX shell unless it is made of safe characters
pub fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

fn relative(path: &Path, dir: &Path) -> String {
    quote_path(path.strip_prefix(dir).unwrap_or(path))
}

fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

fn os(s: impl Into<OsString>) -> OsString {
    s.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::job::JobId;

    fn plan(policy: FailurePolicy) -> (JobPaths, PipelinePlan) {
        let paths = JobPaths::new("/tmp/pdf uploads", JobId::new());
        let plan = PipelinePlan::build(&paths, &DependencyReport::all_present(), policy);
        (paths, plan)
    }

    fn tools(plan: &PipelinePlan) -> Vec<(Tool, Vec<String>)> {
        plan.steps
            .iter()
            .filter_map(|s| match &s.action {
                StepAction::Run { invocation, .. } => {
                    Some((invocation.tool, invocation.args_lossy()))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_plan_runs_tools_in_order_with_job_names() {
        let (paths, plan) = plan(FailurePolicy::Strict);
        let id = paths.id.to_string();
        let runs = tools(&plan);

        let order: Vec<Tool> = runs.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            order,
            vec![
                Tool::Pdftk,
                Tool::Pdftk,
                Tool::Exiftool,
                Tool::Exiftool,
                Tool::Exiftool,
                Tool::Qpdf,
                Tool::Pdftk,
                Tool::Exiftool,
                Tool::Pdfinfo,
            ]
        );
        assert_eq!(runs[0].1, vec![format!("{}.pdf", id), "dump_data".to_string()]);
        assert_eq!(runs[3].1, vec!["-all:all".to_string(), format!("clean-{}.pdf", id)]);
        assert_eq!(
            runs[5].1,
            vec![
                "--linearize".to_string(),
                format!("clean-{}.pdf", id),
                format!("clean2-{}.pdf", id)
            ]
        );
        for step in &plan.steps {
            if let StepAction::Run { invocation, .. } = &step.action {
                assert_eq!(invocation.current_dir, paths.dir());
            }
        }
    }

    #[test]
    fn test_strict_policy_propagates_cleaning_steps() {
        let (_, plan) = plan(FailurePolicy::Strict);
        for step in &plan.steps {
            let expected = match step.stage {
                Stage::Verify => StepPolicy::Suppress,
                _ if step.on_error == "Error in exiftool command 2" => StepPolicy::Suppress,
                _ if step.on_error == "Error in exiftool command 3" => StepPolicy::Suppress,
                _ => StepPolicy::Propagate,
            };
            assert_eq!(step.policy, expected, "{}", step.on_error);
        }
    }

    #[test]
    fn test_lenient_policy_keeps_preflight_and_rename_fatal() {
        let (_, plan) = plan(FailurePolicy::Lenient);
        let fatal: Vec<&str> = plan
            .steps
            .iter()
            .filter(|s| s.policy == StepPolicy::Propagate)
            .map(|s| s.on_error)
            .collect();
        assert_eq!(fatal, vec!["Input file missing", "Error in mv command"]);
    }

    #[test]
    fn test_render_script_quotes_arguments() {
        let (paths, plan) = plan(FailurePolicy::Lenient);
        let script = plan.render_script();
        assert!(script.starts_with("#!/bin/bash\nset -e\nset -x\n"));
        assert!(script.contains("cd '/tmp/pdf uploads'\n"));
        assert!(script.contains(&format!(
            "pdftk {}.pdf dump_data > {} || echo 'Error in dumping data'",
            paths.id,
            paths.original_metadata_name()
        )));
        assert!(script.contains(&format!(
            "mv clean2-{id}.pdf {id}.pdf\n",
            id = paths.id
        )));
        assert!(script.trim_end().ends_with("echo 'Process completed successfully'"));
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("dump_data"), "dump_data");
        assert_eq!(quote("-all:all="), "-all:all=");
        assert_eq!(quote("my file.pdf"), "'my file.pdf'");
        assert_eq!(quote("it's"), "'it'\\''s'");
        assert_eq!(quote(""), "''");
    }
}
