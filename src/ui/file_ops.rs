//! File operations for saving and loading pipelines.
//!
//! Dialogs run on the tokio runtime entered in `main`; results come back to
//! the UI thread through the [`FileOperationResult`] channel.

use super::state::{DesignerApp, FileOperationResult, PendingLoadOperation, PendingSaveOperation};
use crate::types::Pipeline;
use eframe::egui;
use std::sync::mpsc::Sender;

fn report(sender: &Option<Sender<FileOperationResult>>, result: FileOperationResult) {
    if let Some(tx) = sender {
        if tx.send(result).is_err() {
            log::warn!("File operation finished after the app closed");
        }
    }
}

fn write_pipeline(path: String, json: String, sender: Option<Sender<FileOperationResult>>) {
    match std::fs::write(&path, json) {
        Ok(()) => report(&sender, FileOperationResult::SaveCompleted(path)),
        Err(e) => report(
            &sender,
            FileOperationResult::OperationFailed(format!("Failed to save file: {e}")),
        ),
    }
}

impl DesignerApp {
    /// Processes completed async file operations and starts newly requested ones.
    pub fn handle_pending_operations(&mut self, ctx: &egui::Context) {
        if let Some(receiver) = &self.file.file_operation_receiver {
            let results: Vec<FileOperationResult> = receiver.try_iter().collect();
            for result in results {
                self.apply_file_result(result);
            }
        }

        if let Some(save_op) = self.file.pending_save_operation.take() {
            let json = match self.pipeline.to_json() {
                Ok(json) => json,
                Err(e) => {
                    self.apply_file_result(FileOperationResult::OperationFailed(format!(
                        "Failed to serialize pipeline: {e}"
                    )));
                    return;
                }
            };
            let ctx = ctx.clone();
            let sender = self.file.file_operation_sender.clone();

            match (save_op, self.file.current_path.clone()) {
                (PendingSaveOperation::Save, Some(path)) => {
                    tokio::spawn(async move {
                        write_pipeline(path, json, sender);
                        ctx.request_repaint();
                    });
                }
                _ => {
                    let file_name = format!("{}.json", self.pipeline.name);
                    tokio::spawn(async move {
                        if let Some(handle) = rfd::AsyncFileDialog::new()
                            .add_filter("JSON", &["json"])
                            .set_file_name(file_name)
                            .save_file()
                            .await
                        {
                            write_pipeline(handle.path().display().to_string(), json, sender);
                        }
                        ctx.request_repaint();
                    });
                }
            }
        }

        if let Some(PendingLoadOperation::Load) = self.file.pending_load_operation.take() {
            let ctx = ctx.clone();
            let sender = self.file.file_operation_sender.clone();
            tokio::spawn(async move {
                if let Some(handle) = rfd::AsyncFileDialog::new()
                    .add_filter("JSON", &["json"])
                    .pick_file()
                    .await
                {
                    let path = handle.path();
                    match std::fs::read_to_string(path) {
                        Ok(json) => report(
                            &sender,
                            FileOperationResult::LoadCompleted(path.display().to_string(), json),
                        ),
                        Err(e) => report(
                            &sender,
                            FileOperationResult::OperationFailed(format!("Failed to read file: {e}")),
                        ),
                    }
                }
                ctx.request_repaint();
            });
        }
    }

    /// Applies the outcome of a file operation to the app.
    pub fn apply_file_result(&mut self, result: FileOperationResult) {
        match result {
            FileOperationResult::SaveCompleted(path) => {
                log::info!("Saved pipeline to {path}");
                self.file.current_path = Some(path);
                self.file.has_unsaved_changes = false;
                self.file.last_error = None;
            }
            FileOperationResult::LoadCompleted(path, content) => match Pipeline::from_json(&content) {
                Ok(pipeline) => {
                    log::info!("Loaded pipeline '{}' from {path}", pipeline.name);
                    self.pipeline = pipeline;
                    self.file.current_path = Some(path);
                    self.file.has_unsaved_changes = false;
                    self.file.last_error = None;
                    self.interaction.clear_selection();
                    self.undo_history.clear();
                }
                Err(e) => {
                    log::error!("Failed to parse pipeline from {path}: {e}");
                    self.file.last_error = Some(format!("Failed to parse pipeline: {e}"));
                }
            },
            FileOperationResult::OperationFailed(error) => {
                log::error!("File operation failed: {error}");
                self.file.last_error = Some(error);
            }
        }
    }

    /// Opens a file dialog to save the pipeline with a new name.
    pub fn save_as_pipeline(&mut self) {
        self.file.pending_save_operation = Some(PendingSaveOperation::SaveAs);
    }

    /// Saves the pipeline to the current file path, or triggers "Save As" if no path is set.
    pub fn save_pipeline(&mut self) {
        if self.file.current_path.is_some() {
            self.file.pending_save_operation = Some(PendingSaveOperation::Save);
        } else {
            self.save_as_pipeline();
        }
    }

    /// Opens a file dialog to load a pipeline.
    pub fn load_pipeline(&mut self) {
        self.file.pending_load_operation = Some(PendingLoadOperation::Load);
    }

    /// Creates a new empty pipeline, resetting all document state.
    pub fn new_pipeline(&mut self) {
        self.pipeline = Pipeline::default();
        self.file.current_path = None;
        self.file.has_unsaved_changes = false;
        self.file.last_error = None;
        self.interaction.clear_selection();
        self.undo_history.clear();
    }
}
