use crate::models::profile::UserProfile;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载用户画像
pub async fn load_profile(toml_file_path: &Path) -> Result<UserProfile> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取画像文件: {}", toml_file_path.display()))?;

    let profile: UserProfile = toml::from_str(&content)
        .with_context(|| format!("无法解析画像文件: {}", toml_file_path.display()))?;

    tracing::info!("✓ 已加载用户画像 (身份: {})", profile.persona());

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::Persona;

    #[tokio::test]
    async fn test_load_profile_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        std::fs::write(
            &path,
            "persona = \"occupier\"\npurchasePrice = \"720000\"\nworksFromHome = true\n",
        )
        .unwrap();

        let profile = load_profile(&path).await.unwrap();
        assert_eq!(profile.persona(), Persona::Occupier);
    }

    #[tokio::test]
    async fn test_load_profile_rejects_unknown_persona() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        std::fs::write(&path, "persona = \"landlord\"\n").unwrap();

        let err = load_profile(&path).await.unwrap_err();
        assert!(err.to_string().contains("无法解析画像文件"));
    }
}
