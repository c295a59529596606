use std::path::Path;

use axum::{
    body::Bytes,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartRejection},
    },
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::staging::{JobDir, StagedFile, sanitize_file_name};

/// Upload cap for `/create-model`.
pub const MAX_UPLOAD_BYTES: usize = 100 << 20;

const FIELD_MODEL_NAME: &str = "modelName";
const FIELD_WEIGHTS: &str = "modelFile";
const FIELD_DEFINITION: &str = "modelfile";

#[derive(Debug)]
struct Upload {
    file_name: Option<String>,
    data: Bytes,
}

impl Upload {
    async fn read(field: Field<'_>) -> Result<Self, AppError> {
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await?;
        Ok(Self { file_name, data })
    }
}

/// Raw form contents, before validation.
#[derive(Debug, Default)]
struct InstallForm {
    model_name: Option<String>,
    weights: Option<Upload>,
    definition: Option<Upload>,
}

#[derive(Debug)]
struct NamedUpload {
    file_name: String,
    data: Bytes,
}

#[derive(Debug)]
struct InstallRequest {
    model_name: String,
    weights: NamedUpload,
    definition: Option<NamedUpload>,
}

impl InstallForm {
    async fn read(multipart: &mut Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                FIELD_MODEL_NAME => form.model_name = Some(field.text().await?),
                FIELD_WEIGHTS => form.weights = Some(Upload::read(field).await?),
                FIELD_DEFINITION => form.definition = Some(Upload::read(field).await?),
                other => debug!("ignoring form field {:?}", other),
            }
        }
        Ok(form)
    }

    fn validate(self) -> Result<InstallRequest, AppError> {
        let model_name = self
            .model_name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::bad_request("Model name is required"))?;

        let weights = self
            .weights
            .and_then(|u| u.file_name.map(|name| (name, u.data)))
            .ok_or_else(|| AppError::bad_request("Missing .gguf file"))?;
        let weights = NamedUpload {
            file_name: sanitize_file_name(&weights.0)
                .ok_or_else(|| AppError::bad_request("Invalid model file name"))?,
            data: weights.1,
        };

        // A definition part without a file name counts as absent.
        let definition = match self.definition {
            Some(Upload {
                file_name: Some(name),
                data,
            }) => {
                let file_name = sanitize_file_name(&name)
                    .ok_or_else(|| AppError::bad_request("Invalid modelfile name"))?;
                if file_name == weights.file_name {
                    return Err(AppError::bad_request(
                        "Model file and modelfile must have different names",
                    ));
                }
                Some(NamedUpload { file_name, data })
            }
            _ => None,
        };

        Ok(InstallRequest {
            model_name,
            weights,
            definition,
        })
    }
}

/// Staged files of one install. Fields drop in declaration order, so the
/// files are removed before their directory.
#[derive(Debug)]
struct InstallJob {
    model_name: String,
    weights: StagedFile,
    definition: StagedFile,
    synthesized: bool,
    dir: JobDir,
}

impl InstallJob {
    async fn stage(root: &Path, req: InstallRequest) -> Result<Self, AppError> {
        let dir = JobDir::create(root).await?;
        let weights =
            StagedFile::write(dir.path(), &req.weights.file_name, &req.weights.data).await?;

        // An uploaded definition always wins over the synthesized one.
        let (definition, synthesized) = match req.definition {
            Some(def) => (
                StagedFile::write(dir.path(), &def.file_name, &def.data).await?,
                false,
            ),
            None => {
                let name = format!("{}.Modelfile", dir.id());
                let contents = synthesize_definition(weights.path());
                (StagedFile::write(dir.path(), &name, contents).await?, true)
            }
        };

        Ok(Self {
            model_name: req.model_name,
            weights,
            definition,
            synthesized,
            dir,
        })
    }

    fn id(&self) -> Uuid {
        self.dir.id()
    }
}

/// Minimal model definition pointing at a weights file.
pub fn synthesize_definition(weights: &Path) -> String {
    format!("FROM {}", weights.display())
}

/// Stage an uploaded model, register it with `ollama create`, clean up.
pub async fn create_model(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<&'static str, AppError> {
    let mut multipart = multipart.map_err(|e| {
        debug!("bad /create-model payload: {}", e);
        AppError::bad_request("Failed to parse form")
    })?;

    let request = InstallForm::read(&mut multipart).await?.validate()?;
    let job = InstallJob::stage(&state.staging_dir, request).await?;

    info!(
        "[{}] creating model {} from {} ({} definition)",
        job.id(),
        job.model_name,
        job.weights.path().display(),
        if job.synthesized { "synthesized" } else { "uploaded" }
    );

    let outcome = state
        .creator
        .create(&job.model_name, job.definition.path())
        .await;

    let id = job.id();
    drop(job);

    let outcome = outcome?;
    if !outcome.success {
        warn!("[{}] ollama create failed", id);
        return Err(AppError::CreateFailed(outcome.output));
    }

    info!("[{}] model created", id);
    Ok("Model created successfully")
}
