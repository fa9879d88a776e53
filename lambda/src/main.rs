use lambda_http::{run, service_fn, tracing, Body, Error, Request, RequestExt, Response};
use load_profile::core::appliance::Priority;
use load_profile::output::Output;
use load_profile::{run_project, ProjectFlags};
use parking_lot::Mutex;
use serde_json::json;
use std::io;
use std::io::{ErrorKind, Write};
use std::str::{from_utf8, FromStr};
use std::sync::Arc;
use uuid::Uuid;

async fn function_handler(event: Request) -> Result<Response<Body>, Error> {
    let input = match event.body() {
        Body::Empty => &[][..],
        Body::Text(text) => text.as_bytes(),
        Body::Binary(bytes) => bytes.as_slice(),
    };

    let query = event.query_string_parameters();
    let mut flags = ProjectFlags::empty();
    if query.first("validate_only").is_some_and(is_truthy) {
        flags.insert(ProjectFlags::VALIDATE_ONLY);
    }
    if query.first("detailed").is_some_and(is_truthy) {
        flags.insert(ProjectFlags::DETAILED_OUTPUT);
    }
    let priorities = match query.first("priorities").map(parse_priorities).transpose() {
        Ok(priorities) => priorities,
        Err(detail) => return error_response(400, detail),
    };

    let output = LambdaOutput::new();

    let resp = match run_project(input, &output, &flags, priorities.as_deref()) {
        Ok(results) => Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&json!({
                "results": results,
                "files": output.contents(),
            }))?))
            .map_err(Box::new)?,
        Err(e) => return error_response(e.status_code(), e.to_string()),
    };

    Ok(resp)
}

fn error_response(status: u16, detail: String) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(
            &json!({"errors": [{"id": Uuid::new_v4(), "status": status.to_string(), "detail": detail}]}),
        )?))
        .map_err(Box::new)?)
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_priorities(raw: &str) -> Result<Vec<Priority>, String> {
    raw.split(',')
        .map(|priority| {
            Priority::from_str(priority.trim()).map_err(|_| format!("Unknown priority '{priority}'"))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    run(service_fn(function_handler)).await
}

/// This output uses a shared string that individual "file" writers (the FileLikeStringWriter type)
/// can write to - this string is then returned alongside the JSON results.
#[derive(Debug)]
struct LambdaOutput(Arc<Mutex<String>>);

impl LambdaOutput {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(String::with_capacity(
            // a household catalogue produces a few tens of KB of CSV
            2usize.pow(16),
        ))))
    }

    fn contents(&self) -> String {
        self.0.lock().clone()
    }
}

impl Output for LambdaOutput {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        Ok(FileLikeStringWriter::new(
            self.0.clone(),
            location_key,
            file_extension,
        ))
    }
}

impl Output for &LambdaOutput {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        <LambdaOutput as Output>::writer_for_location_key(self, location_key, file_extension)
    }
}

/// Represents a writer for an individual "file".
struct FileLikeStringWriter {
    string: Arc<Mutex<String>>,
    location_key: String,
    file_extension: String,
    has_output_file_header: bool,
}

impl FileLikeStringWriter {
    fn new(string: Arc<Mutex<String>>, location_key: &str, file_extension: &str) -> Self {
        Self {
            string,
            location_key: location_key.to_string(),
            file_extension: file_extension.to_string(),
            has_output_file_header: false,
        }
    }
}

impl Write for FileLikeStringWriter {
    /// Writes out bytes to this "file" (part of the wider LambdaOutput string), making sure there is
    /// a header at the start of the file naming which result set follows.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let utf8 = from_utf8(buf).map_err(|_| {
            io::Error::new(ErrorKind::InvalidData, "Tried to write out invalid UTF-8.")
        })?;
        let mut output_string = self.string.lock();
        if !self.has_output_file_header {
            if !output_string.is_empty() {
                output_string.push_str("\n\n");
            }
            output_string.push_str(&format!(
                "Writing out file '{}.{}':\n\n",
                self.location_key, self.file_extension
            ));
            self.has_output_file_header = true;
        }
        output_string.push_str(utf8);
        Ok(utf8.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
