use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

const GITHUB_OUTPUT: &str = "GITHUB_OUTPUT";
const GITHUB_STATE: &str = "GITHUB_STATE";

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("unable to write {command} file {path:?}: {source}")]
    Io {
        command: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} must not contain the delimiter")]
    Delimiter(&'static str),
}

fn escape_data(s: &str) -> String {
    s.replace('%', "%25").replace('\r', "%0D").replace('\n', "%0A")
}

fn escape_property(s: &str) -> String {
    escape_data(s).replace(':', "%3A").replace(',', "%2C")
}

/// Workflow command sink: annotations on stdout, outputs and state in the runner's env files.
pub struct Action {
    out: Mutex<Box<dyn Write + Send>>,
    output_file: Option<PathBuf>,
    state_file: Option<PathBuf>,
}

impl Action {
    pub fn new(replacer: fn(&str) -> Option<String>) -> Action {
        let path = |name: &str| replacer(name).filter(|p| !p.is_empty()).map(PathBuf::from);
        Action::with_writer(std::io::stdout(), path(GITHUB_OUTPUT), path(GITHUB_STATE))
    }

    pub fn with_writer(
        out: impl Write + Send + 'static,
        output_file: Option<PathBuf>,
        state_file: Option<PathBuf>,
    ) -> Action {
        Action {
            out: Mutex::new(Box::new(out)),
            output_file,
            state_file,
        }
    }

    fn issue(&self, command: &str, properties: &[(&str, &str)], message: &str) {
        let mut line = format!("::{command}");
        if !properties.is_empty() {
            let props = properties
                .iter()
                .map(|(k, v)| format!("{k}={}", escape_property(v)))
                .collect::<Vec<_>>()
                .join(",");
            line.push(' ');
            line.push_str(&props);
        }
        line.push_str("::");
        line.push_str(&escape_data(message));

        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        // Nowhere left to report a broken stdout.
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }

    pub fn warning(&self, message: &str) {
        self.issue("warning", &[], message);
    }

    pub fn error(&self, message: &str) {
        self.issue("error", &[], message);
    }

    pub fn fatal(&self, message: &str) -> ! {
        self.error(message);
        std::process::exit(1)
    }

    pub fn set_output(&self, key: &str, value: &str) -> Result<(), ActionError> {
        match &self.output_file {
            Some(path) => append_file_command("output", path, key, value),
            None => {
                self.issue("set-output", &[("name", key)], value);
                Ok(())
            }
        }
    }

    pub fn save_state(&self, key: &str, value: &str) -> Result<(), ActionError> {
        match &self.state_file {
            Some(path) => append_file_command("state", path, key, value),
            None => {
                self.issue("save-state", &[("name", key)], value);
                Ok(())
            }
        }
    }
}

fn append_file_command(
    command: &'static str,
    path: &Path,
    key: &str,
    value: &str,
) -> Result<(), ActionError> {
    let delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4());
    if key.contains(&delimiter) {
        return Err(ActionError::Delimiter("name"));
    }
    if value.contains(&delimiter) {
        return Err(ActionError::Delimiter("value"));
    }

    let io_error = |source| ActionError::Io {
        command,
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_error)?;
    write!(file, "{key}<<{delimiter}\n{value}\n{delimiter}\n").map_err(io_error)
}
