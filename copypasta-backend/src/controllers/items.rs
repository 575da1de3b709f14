//! Items REST API: notes, file uploads, listing, edits and removal

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use copypasta_types::{EditItemRequest, InsertFileRequest, InsertNoteRequest, ReorderRequest};
use futures_util::StreamExt;

use super::{bulk_response, error_response, respond};
use crate::error::ServiceError;
use crate::items::UploadedFile;
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/notes").route(web::post().to(insert_note)))
        .service(web::resource("/api/files").route(web::post().to(insert_file)))
        .service(web::resource("/api/upload").route(web::post().to(upload)))
        .service(web::resource("/api/items/reorder").route(web::post().to(reorder)))
        .service(web::resource("/api/items/clean-expired").route(web::post().to(clean_expired)))
        .service(
            web::resource("/api/items")
                .route(web::get().to(list_items))
                .route(web::delete().to(remove_all)),
        )
        .service(
            web::resource("/api/items/{id}")
                .route(web::get().to(get_item))
                .route(web::put().to(edit_item))
                .route(web::delete().to(remove_item)),
        );
}

async fn insert_note(state: web::Data<AppState>, body: web::Json<InsertNoteRequest>) -> impl Responder {
    respond(state.service.insert_note(body.into_inner()))
}

async fn insert_file(state: web::Data<AppState>, body: web::Json<InsertFileRequest>) -> impl Responder {
    respond(state.service.insert_file(body.into_inner()))
}

/// Multipart upload: any number of `files` / `files[]` parts, plus optional
/// `content` and `language` text fields
async fn upload(state: web::Data<AppState>, mut payload: Multipart) -> HttpResponse {
    let limit = state.config.max_upload_bytes;
    let mut files: Vec<UploadedFile> = Vec::new();
    let mut content: Option<String> = None;
    let mut language: Option<String> = None;

    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(e) => {
                return error_response(&ServiceError::validation(format!("Failed to process multipart: {}", e)));
            }
        };

        let field_name = field.name().to_string();
        let file_name = field.content_disposition().get_filename().map(|s| s.to_string());
        let content_type = field.content_type().map(|ct| ct.to_string());

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            match chunk {
                Ok(bytes) => {
                    data.extend_from_slice(&bytes);
                    if data.len() as u64 > limit {
                        return error_response(&ServiceError::TooLarge(format!(
                            "File size must be under {}MB",
                            limit / (1024 * 1024)
                        )));
                    }
                }
                Err(e) => {
                    return error_response(&ServiceError::validation(format!("Failed to read upload: {}", e)));
                }
            }
        }

        match field_name.as_str() {
            "files" | "files[]" | "file" => files.push(UploadedFile {
                file_name: file_name.unwrap_or_else(|| "file".to_string()),
                content_type,
                bytes: data,
            }),
            "content" | "language" => {
                let text = match String::from_utf8(data) {
                    Ok(text) => text,
                    Err(_) => {
                        return error_response(&ServiceError::validation(format!("Field '{}' is not valid UTF-8", field_name)));
                    }
                };
                if field_name == "content" {
                    content = Some(text);
                } else {
                    language = Some(text);
                }
            }
            other => log::debug!("Ignoring multipart field '{}'", other),
        }
    }

    let result = state.service.insert_upload(files, content, language);
    if let Ok(ref uploaded) = result {
        log::info!("Upload stored {} files and {} notes", uploaded.files.len(), uploaded.notes.len());
    }
    respond(result)
}

async fn list_items(state: web::Data<AppState>) -> impl Responder {
    respond(state.service.list())
}

async fn get_item(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    respond(state.service.get(&path.into_inner()))
}

async fn edit_item(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<EditItemRequest>,
) -> impl Responder {
    respond(state.service.edit(&path.into_inner(), body.into_inner()).map(|_| true))
}

async fn remove_item(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    respond(state.service.remove(&path.into_inner()).map(|_| true))
}

async fn remove_all(state: web::Data<AppState>) -> impl Responder {
    bulk_response(state.service.remove_all())
}

async fn reorder(state: web::Data<AppState>, body: web::Json<ReorderRequest>) -> impl Responder {
    respond(state.service.reorder(&body.ids).map(|_| true))
}

async fn clean_expired(state: web::Data<AppState>) -> impl Responder {
    bulk_response(state.service.clean_expired())
}
