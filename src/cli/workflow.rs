//! Workflow-related CLI commands
//!
//! Commands against the orchestration service: listing registered
//! workflows, inspecting one, triggering runs and following run states.

use std::path::PathBuf;

use structopt::StructOpt;
use tokio::runtime::Runtime;

use crate::api::workflow::execute::execute_workflow;
use crate::api::workflow::info::{get_workflow, get_workflow_params};
use crate::api::workflow::list::list_workflows;
use crate::api::workflow::runs::workflow_runs;
use crate::client::BaseClient;

use super::base::{evaluate_and_print_response, parse_file, print_error, Matcher};

/// Subcommands for workflows on the orchestration service
#[derive(StructOpt, Debug)]
#[structopt(about = "Handle workflows of the DataPool instance")]
pub enum WorkflowSubCommand {
    /// List the registered workflows
    #[structopt(about = "List the registered workflows")]
    List {},

    /// Show one workflow's registration record
    #[structopt(about = "Show a workflow")]
    Info {
        #[structopt(help = "ID of the workflow")]
        id: String,
    },

    /// Show one workflow's default parameters
    #[structopt(about = "Show a workflow's default parameters")]
    Params {
        #[structopt(help = "ID of the workflow")]
        id: String,
    },

    /// Trigger a run of a workflow
    #[structopt(about = "Trigger a workflow run")]
    Execute {
        #[structopt(help = "ID of the workflow")]
        id: String,

        #[structopt(
            long,
            short,
            help = "Path to the JSON/YAML file with the run parameters"
        )]
        params: Option<PathBuf>,

        #[structopt(long, short, help = "Run ID, generated when omitted")]
        run_id: Option<String>,
    },

    /// Show the run states of a workflow
    #[structopt(about = "Show a workflow's runs")]
    Runs {
        #[structopt(help = "ID of the workflow")]
        id: String,
    },
}

impl Matcher for WorkflowSubCommand {
    fn process(self, client: &BaseClient) {
        let runtime = Runtime::new().expect("Failed to start the async runtime");

        match self {
            WorkflowSubCommand::List {} => {
                evaluate_and_print_response(runtime.block_on(list_workflows(client)));
            }

            WorkflowSubCommand::Info { id } => {
                evaluate_and_print_response(runtime.block_on(get_workflow(client, &id)));
            }

            WorkflowSubCommand::Params { id } => {
                evaluate_and_print_response(
                    runtime.block_on(get_workflow_params(client, &id)),
                );
            }

            WorkflowSubCommand::Execute { id, params, run_id } => {
                let parameters = match params {
                    Some(path) => match parse_file(&path) {
                        Ok(value) => value,
                        Err(e) => {
                            print_error(format!("could not read parameter file: {e}"));
                            std::process::exit(exitcode::DATAERR);
                        }
                    },
                    None => serde_json::Value::Object(Default::default()),
                };

                evaluate_and_print_response(
                    runtime.block_on(execute_workflow(client, &id, parameters, run_id)),
                );
            }

            WorkflowSubCommand::Runs { id } => {
                evaluate_and_print_response(runtime.block_on(workflow_runs(client, &id)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use structopt::StructOpt;

    use super::*;

    #[test]
    fn test_execute_args_parse() {
        let cmd = WorkflowSubCommand::from_iter_safe([
            "workflow",
            "execute",
            "ingest-pipeline",
            "--run-id",
            "my-run",
        ])
        .expect("Failed to parse args");

        match cmd {
            WorkflowSubCommand::Execute { id, run_id, params } => {
                assert_eq!(id, "ingest-pipeline");
                assert_eq!(run_id.as_deref(), Some("my-run"));
                assert!(params.is_none());
            }
            other => panic!("parsed the wrong variant: {other:?}"),
        }
    }
}
