use std::{
    process::Command,
    time::{SystemTime, UNIX_EPOCH},
};

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output();

    let version = match output {
        Ok(o) if o.status.success() => {
            let git_output = String::from_utf8(o.stdout)
                .unwrap_or_default()
                .trim()
                .to_string();

            // "v1.0.0" -> "1.0.0"
            let version = git_output.strip_prefix('v').unwrap_or(&git_output);

            // The lifecycle gate and the self-update check parse this as semver, so
            // anything that is not a clean tag is expressed as build metadata.
            if version.is_empty() {
                format!("{}+unknown.{}", package_version(), timestamp())
            } else if let Some(clean) = version.strip_suffix("-dirty") {
                let base = from_describe(clean);
                let sep = if base.contains('+') { '.' } else { '+' };
                format!("{}{}dirty.{}", base, sep, timestamp())
            } else {
                from_describe(version)
            }
        }
        _ => format!("{}+unknown.{}", package_version(), timestamp()),
    };

    println!("cargo:rustc-env=PLUCK_VERSION={}", version);
}

/// "1.2.0-3-gabc123" -> "1.2.0+3.gabc123"; a bare commit hash -> "<pkg>+g<hash>".
fn from_describe(describe: &str) -> String {
    if !describe.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("{}+g{}", package_version(), describe);
    }
    let parts: Vec<&str> = describe.rsplitn(3, '-').collect();
    if let [hash, commits, tag] = parts[..]
        && hash.starts_with('g')
        && commits.chars().all(|c| c.is_ascii_digit())
    {
        return format!("{}+{}.{}", tag, commits, hash);
    }
    describe.to_string()
}

fn package_version() -> String {
    std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string())
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}
