//! Raw item download with HTTP range support

use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{mime, web, HttpRequest, HttpResponse};
use copypasta_types::{Item, ItemType};

use super::error_response;
use crate::error::ServiceError;
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/download/{id}").route(web::get().to(download)));
}

/// Name offered to the browser for the saved file
fn download_name(item: &Item) -> String {
    match (&item.item_type, &item.file_name) {
        (ItemType::File, Some(name)) => name.clone(),
        _ => format!("{}.txt", item.id),
    }
}

fn content_type(item: &Item) -> mime::Mime {
    match item.item_type {
        ItemType::Note => mime::TEXT_PLAIN_UTF_8,
        ItemType::File => item
            .file_type
            .as_deref()
            .and_then(|t| t.parse::<mime::Mime>().ok())
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
    }
}

/// Stream an item's content. `NamedFile` answers `Range` requests with
/// 206 and `Content-Range`, full requests with 200 and `Content-Length`.
async fn download(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();
    let (item, file_path) = match state.service.download(&id) {
        Ok(found) => found,
        Err(e) => return error_response(&e),
    };

    let file = match NamedFile::open_async(&file_path).await {
        Ok(file) => file,
        Err(e) => {
            log::error!("Failed to open content of {}: {}", id, e);
            return error_response(&ServiceError::Storage(format!("Could not open item {}", id)));
        }
    };

    file.set_content_type(content_type(&item))
        .set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(download_name(&item))],
        })
        .into_response(&req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::test_state;
    use actix_web::{http::StatusCode, test, App};
    use copypasta_types::{InsertFileRequest, InsertNoteRequest};

    #[actix_web::test]
    async fn test_full_and_ranged_download() {
        let (_dir, state, _clock) = test_state(1024);
        let item = state
            .service
            .insert_note(InsertNoteRequest {
                content: "hello world".to_string(),
                language: None,
                original_size: None,
                created_at: None,
                expires_at: None,
            })
            .unwrap();
        let app = test::init_service(App::new().app_data(state.clone()).configure(config)).await;

        let req = test::TestRequest::get().uri(&format!("/download/{}", item.id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], b"hello world");

        let req = test::TestRequest::get()
            .uri(&format!("/download/{}", item.id))
            .insert_header(("Range", "bytes=0-4"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers().get("content-range").unwrap(), "bytes 0-4/11");
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], b"hello");
    }

    #[actix_web::test]
    async fn test_file_download_headers() {
        let (_dir, state, _clock) = test_state(1024);
        let item = state
            .service
            .insert_file(InsertFileRequest {
                content: "a,b\n1,2\n".to_string(),
                file_name: "data.csv".to_string(),
                file_type: Some("text/csv".to_string()),
                is_text: true,
                language: None,
                original_size: 8,
                created_at: None,
                expires_at: None,
            })
            .unwrap();
        let app = test::init_service(App::new().app_data(state.clone()).configure(config)).await;

        let req = test::TestRequest::get().uri(&format!("/download/{}", item.id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/csv"));
        let disposition = resp.headers().get("content-disposition").unwrap().to_str().unwrap();
        assert!(disposition.contains("attachment"));
        assert!(disposition.contains("data.csv"));
    }

    #[actix_web::test]
    async fn test_missing_item_is_404() {
        let (_dir, state, _clock) = test_state(1024);
        let app = test::init_service(App::new().app_data(state.clone()).configure(config)).await;

        let req = test::TestRequest::get().uri("/download/12345").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
