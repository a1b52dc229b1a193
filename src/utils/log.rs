use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

fn log_path(log_dir: &str, filename: &str) -> io::Result<PathBuf> {
    // Create directory if it doesn't exist
    if !Path::new(log_dir).exists() {
        fs::create_dir_all(log_dir)?;
    }
    Ok(Path::new(log_dir).join(filename))
}

/// Logs a message to a file with an RFC 3339 timestamp
///
/// # Arguments
///
/// * `log_dir` - Directory holding the log file, created if missing
/// * `filename` - The name of the log file
/// * `message` - The message to log
///
/// # Returns
///
/// * `io::Result<()>` - Success or error result
pub fn log_to_file(log_dir: &str, filename: &str, message: &str) -> io::Result<()> {
    let path = log_path(log_dir, filename)?;

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    writeln!(file, "\n--- Log entry at {} ---", Local::now().to_rfc3339())?;
    writeln!(file, "{}", message)?;
    writeln!(file, "--- End of entry ---\n")?;

    file.flush()?;

    Ok(())
}

/// Logs a message to a file with a detailed formatted header
///
/// # Arguments
///
/// * `log_dir` - Directory holding the log file
/// * `filename` - The name of the log file
/// * `header` - A descriptive header for this log entry
/// * `message` - The message to log
///
/// # Returns
///
/// * `io::Result<()>` - Success or error result
pub fn log_with_header(log_dir: &str, filename: &str, header: &str, message: &str) -> io::Result<()> {
    let formatted_message = format!(
        "===== {} =====\n{}\n====================",
        header, message
    );
    log_to_file(log_dir, filename, &formatted_message)
}

/// Appends a row to a CSV file, creating headers if the file is new
///
/// # Arguments
///
/// * `log_dir` - Directory holding the CSV file
/// * `filename` - The name of the CSV file
/// * `headers` - Column headers (only written if file is new)
/// * `data` - Row of data to append
///
/// # Returns
///
/// * `Result<(), csv::Error>` - Success or error result; I/O failures arrive
///   as `csv::Error`
pub fn log_csv(log_dir: &str, filename: &str, headers: &[&str], data: &[String]) -> Result<(), csv::Error> {
    let path = log_path(log_dir, filename)?;
    let file_exists = path.exists();

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::Writer::from_writer(file);

    if !file_exists && !headers.is_empty() {
        writer.write_record(headers)?;
    }

    writer.write_record(data)?;
    writer.flush()?;

    Ok(())
}
