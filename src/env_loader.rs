use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(work_root: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    let base = work_root.or(home_dir)?;
    Some(base.join(".site-recode/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("RECODE_WORK_ROOT").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

#[cfg(test)]
mod tests {
    use super::fallback_dotenv_path;
    use std::path::PathBuf;

    #[test]
    fn fallback_prefers_the_work_root() {
        let got = fallback_dotenv_path(
            Some(PathBuf::from("/site")),
            Some(PathBuf::from("/home/alice")),
        );
        assert_eq!(got, Some(PathBuf::from("/site/.site-recode/.env")));
    }

    #[test]
    fn fallback_uses_home_when_work_root_unset() {
        let got = fallback_dotenv_path(None, Some(PathBuf::from("/home/alice")));
        assert_eq!(got, Some(PathBuf::from("/home/alice/.site-recode/.env")));
    }
}
