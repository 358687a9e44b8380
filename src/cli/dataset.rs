//! Dataset-related CLI commands
//!
//! This module provides commands for dataset management tasks like:
//! - Creating, deleting and listing datasets
//! - Inspecting staging states
//! - Rendering a dataset's file listing as a tree or a table
//! - Resumable uploads and staged downloads

use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;
use structopt::StructOpt;
use tokio::runtime::Runtime;

use crate::api::dataset::create::{create_dataset, DatasetMetadata};
use crate::api::dataset::delete::delete_dataset;
use crate::api::dataset::download::{download_dataset, PollConfig};
use crate::api::dataset::listing::list_dataset_files;
use crate::api::dataset::search::list_datasets;
use crate::api::dataset::status::staging_status;
use crate::api::dataset::upload::{
    upload_new, upload_rewrite, NewDatasetUpload, RewriteUpload,
};
use crate::client::BaseClient;
use crate::location::{AccessScope, DatasetLocation};
use crate::progress::{progress_callback, setup_progress_log};
use crate::tree::{DirectoryTree, FileRow};

use super::base::{evaluate_and_print_response, parse_file, print_error, Matcher};

/// Subcommands for managing datasets of a DataPool instance
#[derive(StructOpt, Debug)]
#[structopt(about = "Handle datasets of the DataPool instance")]
pub enum DatasetSubCommand {
    /// Create an empty dataset
    #[structopt(about = "Create an empty dataset")]
    Create {
        #[structopt(long, short, help = "Access scope (public, project, user)")]
        access: AccessScope,

        #[structopt(long, short, help = "Project short name")]
        project: String,

        #[structopt(long, short, help = "Storage zone, session default when omitted")]
        zone: Option<String>,

        #[structopt(
            long,
            short,
            help = "Path to the JSON/YAML file with the descriptive metadata"
        )]
        body: Option<PathBuf>,
    },

    /// Delete a dataset by internal ID
    #[structopt(about = "Delete a dataset")]
    Delete {
        #[structopt(help = "Internal ID of the dataset to delete")]
        id: String,

        #[structopt(long, short, help = "Access scope (public, project, user)")]
        access: AccessScope,

        #[structopt(long, short, help = "Project short name")]
        project: String,
    },

    /// List all visible datasets
    #[structopt(about = "List all visible datasets")]
    List {},

    /// Show the staging states of the session's datasets
    #[structopt(about = "Show dataset staging states")]
    Status {},

    /// Show a dataset's files as a tree or a table
    #[structopt(about = "List the files of a dataset")]
    Files {
        #[structopt(help = "Internal ID of the dataset")]
        id: String,

        #[structopt(long, short, help = "Access scope (public, project, user)")]
        access: AccessScope,

        #[structopt(long, short, help = "Project short name")]
        project: String,

        #[structopt(long, short, help = "Storage zone, session default when omitted")]
        zone: Option<String>,

        #[structopt(long, help = "Sub-path inside the dataset", default_value = "")]
        path: String,

        #[structopt(long, short, help = "Render a flat file table instead of the tree")]
        table: bool,
    },

    /// Upload a file through the resumable upload endpoint
    #[structopt(about = "Upload a file, creating a dataset or rewriting an existing one")]
    Upload {
        #[structopt(help = "Path to the file to upload")]
        file: PathBuf,

        #[structopt(long, short, help = "Access scope (public, project, user)")]
        access: AccessScope,

        #[structopt(long, short, help = "Project short name")]
        project: String,

        #[structopt(long, short, help = "Storage zone, session default when omitted")]
        zone: Option<String>,

        #[structopt(long, help = "Path inside the dataset", default_value = "")]
        dataset_path: String,

        #[structopt(long, short, help = "Owning username recorded with the data")]
        user: Option<String>,

        #[structopt(
            long,
            help = "Path to the JSON/YAML file with the descriptive metadata"
        )]
        body: Option<PathBuf>,

        #[structopt(long, help = "Request server-side encryption")]
        encryption: bool,

        #[structopt(
            long,
            short,
            help = "Internal ID of an existing dataset to rewrite into"
        )]
        id: Option<String>,

        #[structopt(long, help = "Title of the existing dataset (with --id)")]
        title: Option<String>,
    },

    /// Download a dataset through the staged-download protocol
    #[structopt(about = "Download a dataset (optionally a sub-path of it)")]
    Download {
        #[structopt(help = "Internal ID of the dataset")]
        id: String,

        #[structopt(long, short, help = "Access scope (public, project, user)")]
        access: AccessScope,

        #[structopt(long, short, help = "Project short name")]
        project: String,

        #[structopt(long, short, help = "Storage zone, session default when omitted")]
        zone: Option<String>,

        #[structopt(long, help = "Sub-path inside the dataset", default_value = "")]
        path: String,

        #[structopt(
            long,
            short,
            help = "Destination file",
            default_value = "./download.tar.gz"
        )]
        destination: PathBuf,

        #[structopt(long, help = "Maximum number of status polls", default_value = "200")]
        max_retries: u32,

        #[structopt(long, help = "Seconds between status polls", default_value = "5")]
        poll_delay: u64,
    },
}

impl Matcher for DatasetSubCommand {
    fn process(self, client: &BaseClient) {
        let runtime = Runtime::new().expect("Failed to start the async runtime");

        match self {
            DatasetSubCommand::Create {
                access,
                project,
                zone,
                body,
            } => {
                let metadata = load_metadata(body);
                let response = runtime.block_on(create_dataset(
                    client,
                    access,
                    &project,
                    zone.as_deref(),
                    "",
                    &metadata,
                ));
                evaluate_and_print_response(response);
            }

            DatasetSubCommand::Delete {
                id,
                access,
                project,
            } => {
                let response =
                    runtime.block_on(delete_dataset(client, &id, access, &project));
                evaluate_and_print_response(response);
            }

            DatasetSubCommand::List {} => {
                let response = runtime.block_on(list_datasets(client));
                evaluate_and_print_response(response);
            }

            DatasetSubCommand::Status {} => {
                let response = runtime.block_on(staging_status(client));
                evaluate_and_print_response(response);
            }

            DatasetSubCommand::Files {
                id,
                access,
                project,
                zone,
                path,
                table,
            } => {
                let location = location_for(client, id, access, project, zone);
                let listing =
                    runtime.block_on(list_dataset_files(client, &location, &path));

                match listing.and_then(|value| DirectoryTree::from_listing(&value)) {
                    Ok(tree) => {
                        if table {
                            print_file_table(&tree.file_rows());
                        } else {
                            for line in tree.render_lines() {
                                println!("{}", line);
                            }
                        }
                        std::process::exit(exitcode::OK);
                    }
                    Err(e) => {
                        print_error(e);
                        std::process::exit(exitcode::DATAERR);
                    }
                }
            }

            DatasetSubCommand::Upload {
                file,
                access,
                project,
                zone,
                dataset_path,
                user,
                body,
                encryption,
                id,
                title,
            } => {
                let result = runtime.block_on(run_upload(
                    client,
                    file,
                    access,
                    project,
                    zone,
                    dataset_path,
                    user,
                    body,
                    encryption,
                    id,
                    title,
                ));

                match result {
                    Ok(()) => {
                        println!("\n{}", "Upload complete.".green().bold());
                        std::process::exit(exitcode::OK);
                    }
                    Err(e) => {
                        print_error(e);
                        std::process::exit(exitcode::DATAERR);
                    }
                }
            }

            DatasetSubCommand::Download {
                id,
                access,
                project,
                zone,
                path,
                destination,
                max_retries,
                poll_delay,
            } => {
                let location = location_for(client, id, access, project, zone);
                let config = PollConfig {
                    max_retries,
                    delay: Duration::from_secs(poll_delay),
                };

                let bar = indicatif::ProgressBar::new(0);
                let callback = progress_callback(bar.clone());

                let result = runtime.block_on(download_dataset(
                    client,
                    &location,
                    &path,
                    &destination,
                    &config,
                    Some(&callback),
                ));
                bar.finish_and_clear();

                match result {
                    Ok(()) => {
                        println!(
                            "\nDataset saved to: {}",
                            destination.display().to_string().bold().green()
                        );
                        std::process::exit(exitcode::OK);
                    }
                    Err(e) => {
                        print_error(e.to_string());
                        std::process::exit(exitcode::DATAERR);
                    }
                }
            }
        }
    }
}

fn location_for(
    client: &BaseClient,
    id: String,
    access: AccessScope,
    project: String,
    zone: Option<String>,
) -> DatasetLocation {
    DatasetLocation::new(
        id,
        access,
        project,
        zone.unwrap_or_else(|| client.zone().to_string()),
    )
}

fn load_metadata(body: Option<PathBuf>) -> DatasetMetadata {
    match body {
        Some(path) => parse_file(&path).unwrap_or_else(|e| {
            print_error(format!("could not read metadata file: {e}"));
            std::process::exit(exitcode::DATAERR);
        }),
        None => DatasetMetadata::default(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_upload(
    client: &BaseClient,
    file: PathBuf,
    access: AccessScope,
    project: String,
    zone: Option<String>,
    dataset_path: String,
    user: Option<String>,
    body: Option<PathBuf>,
    encryption: bool,
    id: Option<String>,
    title: Option<String>,
) -> Result<(), String> {
    let mut uploader = match id {
        Some(internal_id) => {
            let title = title.ok_or("--title is required when rewriting a dataset")?;
            upload_rewrite(
                client,
                &file,
                RewriteUpload {
                    internal_id,
                    title,
                    access,
                    project,
                    zone,
                    dataset_path,
                    encryption,
                },
            )
            .await?
        }
        None => {
            let metadata = match body {
                Some(path) => {
                    parse_file(&path).map_err(|e| format!("could not read metadata file: {e}"))?
                }
                None => DatasetMetadata::default(),
            };

            upload_new(
                client,
                &file,
                NewDatasetUpload {
                    access,
                    project,
                    zone,
                    dataset_path,
                    owner_user: user.unwrap_or_else(whoami_fallback),
                    encryption,
                    metadata,
                },
            )
            .await?
        }
    };

    let size = tokio::fs::metadata(&file).await.map_err(|e| e.to_string())?.len();
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();

    let bar = setup_progress_log(size, None, &name);
    let callback = progress_callback(bar.clone());

    let result = uploader.upload(None, Some(&callback)).await;
    bar.finish_and_clear();

    result.map_err(|e| e.to_string())
}

fn whoami_fallback() -> String {
    std::env::var("USER").unwrap_or_else(|_| "UNKNOWN user".to_string())
}

fn print_file_table(rows: &[FileRow]) {
    let headers = ["Filename", "Path", "Size", "CreateTime", "Checksum"];
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();

    for row in rows {
        let cells = [
            &row.name,
            &row.path,
            &row.size,
            &row.create_time,
            &row.checksum,
        ];
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: [&str; 5]| {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{cell:<w$}", w = *width))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let header_line = line(headers);
    println!("{}", header_line.as_str().bold());
    for row in rows {
        println!(
            "{}",
            line([
                &row.name,
                &row.path,
                &row.size,
                &row.create_time,
                &row.checksum
            ])
        );
    }
}

#[cfg(test)]
mod tests {
    use structopt::StructOpt;

    use super::*;

    #[test]
    fn test_download_args_parse_with_defaults() {
        let cmd = DatasetSubCommand::from_iter_safe([
            "dataset",
            "download",
            "5a0ca748-0b3a-4f83-a784-4b32b2f0f123",
            "--access",
            "project",
            "--project",
            "climate",
        ])
        .expect("Failed to parse args");

        match cmd {
            DatasetSubCommand::Download {
                max_retries,
                poll_delay,
                destination,
                ..
            } => {
                assert_eq!(max_retries, 200);
                assert_eq!(poll_delay, 5);
                assert_eq!(destination, PathBuf::from("./download.tar.gz"));
            }
            other => panic!("parsed the wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_upload_args_reject_unknown_access_scope() {
        let parsed = DatasetSubCommand::from_iter_safe([
            "dataset",
            "upload",
            "data.bin",
            "--access",
            "everyone",
            "--project",
            "climate",
        ]);

        assert!(parsed.is_err());
    }
}
