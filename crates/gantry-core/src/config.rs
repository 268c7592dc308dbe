use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tempfile::NamedTempFile;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::error::GanttError;

pub const DEFAULT_DOMAIN: &str =
  "backlog.com";
pub const DEFAULT_WINDOW_MONTHS: u32 =
  3;
pub const DEFAULT_CHART_COLUMNS: usize =
  60;

const SPACE_KEY: &str = "backlog.space";
const API_KEY_KEY: &str =
  "backlog.api_key";
const DOMAIN_KEY: &str =
  "backlog.domain";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  pub space:   String,
  pub api_key: String,
  pub domain:  String
}

impl std::fmt::Debug for Credentials {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>
  ) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("space", &self.space)
      .field("api_key", &"<redacted>")
      .field("domain", &self.domain)
      .finish()
  }
}

/// Development toggles handed to the
/// coordinator and renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DevConfig {
  pub performance_logging: bool,
  pub detailed_logging:    bool,
  pub performance_threshold:
    Duration
}

impl Default for DevConfig {
  fn default() -> Self {
    Self {
      performance_logging: false,
      detailed_logging: false,
      performance_threshold:
        Duration::from_millis(100)
    }
  }
}

impl DevConfig {
  pub fn observe(
    &self,
    stage: &str,
    elapsed: Duration
  ) {
    if !self.performance_logging {
      return;
    }
    let elapsed_ms =
      elapsed.as_secs_f64() * 1000.0;
    if elapsed
      > self.performance_threshold
    {
      warn!(
        stage,
        elapsed_ms,
        threshold_ms = self
          .performance_threshold
          .as_millis() as u64,
        "slow stage"
      );
    } else if self.detailed_logging {
      debug!(
        stage,
        elapsed_ms, "stage timing"
      );
    }
  }
}

impl Config {
  pub fn empty() -> Self {
    Self {
      map:          HashMap::new(),
      loaded_files: vec![]
    }
  }

  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::empty();

    cfg.map.insert(
      DOMAIN_KEY.to_string(),
      DEFAULT_DOMAIN.to_string()
    );
    cfg.map.insert(
      "color".to_string(),
      "on".to_string()
    );

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      if path.exists() {
        info!(rc = %path.display(), "loading gantryrc");
        cfg.load_file(&path)?;
      } else {
        warn!(rc = %path.display(), "gantryrc does not exist; using defaults");
      }
    } else {
      debug!(
        "gantryrc disabled; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      if key == API_KEY_KEY {
        debug!(key = %key, "applying override");
      } else {
        debug!(key = %key, value = %v, "applying override");
      }
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn get_u64(
    &self,
    key: &str
  ) -> Option<u64> {
    let raw = self.map.get(key)?;
    match raw.trim().parse::<u64>() {
      | Ok(value) => Some(value),
      | Err(err) => {
        warn!(key, value = %raw, error = %err, "ignoring non-numeric config value");
        None
      }
    }
  }

  pub fn credentials(
    &self
  ) -> Result<Credentials, GanttError> {
    let space = self
      .get(SPACE_KEY)
      .map(|v| v.trim().to_string())
      .unwrap_or_default();
    let api_key = self
      .get(API_KEY_KEY)
      .map(|v| v.trim().to_string())
      .unwrap_or_default();

    if space.is_empty()
      || api_key.is_empty()
    {
      return Err(
        GanttError::Validation(
          "space id and API key must \
           be configured (gantry \
           configure --space ID \
           --api-key KEY)"
            .to_string()
        )
      );
    }

    let domain = self
      .get(DOMAIN_KEY)
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
      .unwrap_or_else(|| {
        DEFAULT_DOMAIN.to_string()
      });

    Ok(Credentials {
      space,
      api_key,
      domain
    })
  }

  pub fn window_months(&self) -> u32 {
    self
      .get_u64("chart.months")
      .filter(|m| *m > 0)
      .map(|m| m.min(24) as u32)
      .unwrap_or(DEFAULT_WINDOW_MONTHS)
  }

  pub fn chart_columns(&self) -> usize {
    self
      .get_u64("chart.columns")
      .filter(|c| *c >= 10)
      .map(|c| c as usize)
      .unwrap_or(DEFAULT_CHART_COLUMNS)
  }

  pub fn dev_config(&self) -> DevConfig {
    let defaults = DevConfig::default();
    DevConfig {
      performance_logging: self
        .get_bool(
          "dev.performance_logging"
        )
        .unwrap_or(false),
      detailed_logging: self
        .get_bool(
          "dev.detailed_logging"
        )
        .unwrap_or(false),
      performance_threshold: self
        .get_u64(
          "dev.performance_threshold_ms"
        )
        .map(Duration::from_millis)
        .unwrap_or(
          defaults
            .performance_threshold
        )
    }
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let Some(line) =
        strip_comment(raw_line)
      else {
        continue;
      };

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if self
          .loaded_files
          .contains(&include_path)
        {
          warn!(include = %include_path.display(), "include cycle; skipping");
        } else if include_path.exists()
        {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

/// Writes the credential keys into the
/// rc file, keeping every other line.
#[tracing::instrument(skip(
  credentials
))]
pub fn save_credentials(
  path: &Path,
  credentials: &Credentials
) -> anyhow::Result<()> {
  let path = expand_tilde(path);
  let existing = if path.exists() {
    fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?
  } else {
    String::new()
  };

  let managed = [
    (SPACE_KEY, credentials.space.as_str()),
    (
      API_KEY_KEY,
      credentials.api_key.as_str()
    ),
    (
      DOMAIN_KEY,
      credentials.domain.as_str()
    )
  ];

  let mut lines: Vec<String> = existing
    .lines()
    .filter(|raw| {
      let key = strip_comment(raw)
        .and_then(|line| {
          line.split_once('=')
        })
        .map(|(k, _)| k.trim());
      !matches!(key, Some(k) if managed.iter().any(|(m, _)| *m == k))
    })
    .map(str::to_string)
    .collect();

  for (key, value) in managed {
    lines.push(format!("{key}={value}"));
  }

  let dir = path
    .parent()
    .filter(|p| {
      !p.as_os_str().is_empty()
    })
    .unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(dir)
    .with_context(|| {
      format!(
        "failed to create {}",
        dir.display()
      )
    })?;

  let mut temp =
    NamedTempFile::new_in(dir)?;
  for line in &lines {
    writeln!(temp, "{line}")?;
  }
  temp.flush()?;
  temp.persist(&path).map_err(
    |err| {
      anyhow!(
        "failed to persist {}: {}",
        path.display(),
        err
      )
    }
  )?;

  info!(rc = %path.display(), "saved backlog credentials");
  Ok(())
}

/// The file `configure` writes to, even
/// when it does not exist yet.
pub fn rc_write_target(
  rc_override: Option<&Path>
) -> anyhow::Result<PathBuf> {
  resolve_rc_path(rc_override)?
    .ok_or_else(|| {
      anyhow!(
        "gantryrc is disabled \
         (GANTRYRC=/dev/null); pass \
         --gantryrc PATH"
      )
    })
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(expand_tilde(path)));
  }

  if let Ok(rc_env) =
    std::env::var("GANTRYRC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(expand_tilde(
      Path::new(&rc_env)
    )));
  }

  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(Some(home.join(".gantryrc")))
}

fn strip_comment(
  raw_line: &str
) -> Option<&str> {
  let mut line = raw_line.trim();
  if let Some((before, _)) =
    line.split_once('#')
  {
    line = before.trim();
  }
  if line.is_empty() {
    None
  } else {
    Some(line)
  }
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::time::Duration;

  use tempfile::tempdir;

  use super::{
    Config,
    Credentials,
    save_credentials
  };
  use crate::error::ErrorKind;

  #[test]
  fn loads_includes_and_ignores_comments()
   {
    let dir = tempdir().unwrap();
    let shared = dir.path().join("shared.rc");
    fs::write(
      &shared,
      "status.open = Todo, Open\n"
    )
    .unwrap();
    let rc = dir.path().join("gantryrc");
    fs::write(
      &rc,
      "# settings\nbacklog.space = acme # trailing\ninclude shared.rc\nchart.months=6\n"
    )
    .unwrap();

    let cfg =
      Config::load(Some(&rc)).unwrap();
    assert_eq!(
      cfg.get("backlog.space").as_deref(),
      Some("acme")
    );
    assert_eq!(
      cfg.get("status.open").as_deref(),
      Some("Todo, Open")
    );
    assert_eq!(cfg.window_months(), 6);
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn missing_credentials_are_a_validation_error()
   {
    let mut cfg = Config::empty();
    cfg.apply_overrides([(
      "rc.backlog.space".to_string(),
      "acme".to_string()
    )]);

    let err =
      cfg.credentials().unwrap_err();
    assert_eq!(
      err.kind(),
      ErrorKind::Validation
    );

    cfg.apply_overrides([(
      "backlog.api_key".to_string(),
      "secret".to_string()
    )]);
    let creds =
      cfg.credentials().unwrap();
    assert_eq!(creds.domain, "backlog.com");
    assert!(
      !format!("{creds:?}")
        .contains("secret")
    );
  }

  #[test]
  fn save_credentials_rewrites_only_managed_keys()
   {
    let dir = tempdir().unwrap();
    let rc = dir.path().join("gantryrc");
    fs::write(
      &rc,
      "color=off\nbacklog.space=old\n"
    )
    .unwrap();

    save_credentials(
      &rc,
      &Credentials {
        space:   "acme".to_string(),
        api_key: "k".to_string(),
        domain:  "backlog.jp".to_string()
      }
    )
    .unwrap();

    let cfg =
      Config::load(Some(&rc)).unwrap();
    assert_eq!(
      cfg.get("color").as_deref(),
      Some("off")
    );
    assert_eq!(
      cfg.get("backlog.space").as_deref(),
      Some("acme")
    );
    assert_eq!(
      fs::read_to_string(&rc)
        .unwrap()
        .matches("backlog.space")
        .count(),
      1
    );
  }

  #[test]
  fn dev_config_reads_threshold() {
    let mut cfg = Config::empty();
    cfg.apply_overrides([
      (
        "dev.performance_logging"
          .to_string(),
        "yes".to_string()
      ),
      (
        "dev.performance_threshold_ms"
          .to_string(),
        "250".to_string()
      )
    ]);

    let dev = cfg.dev_config();
    assert!(dev.performance_logging);
    assert!(!dev.detailed_logging);
    assert_eq!(
      dev.performance_threshold,
      Duration::from_millis(250)
    );
  }
}
