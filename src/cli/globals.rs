use secrecy::SecretString;

pub const DEFAULT_KV_MOUNT: &str = "secret";

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub vault_url: String,
    pub vault_token: SecretString,
    pub vault_kv_mount: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(vurl: String) -> Self {
        Self {
            vault_url: vurl,
            vault_token: SecretString::default(),
            vault_kv_mount: DEFAULT_KV_MOUNT.to_string(),
        }
    }

    pub fn set_token(&mut self, token: SecretString) {
        self.vault_token = token;
    }

    pub fn set_kv_mount(&mut self, mount: impl Into<String>) {
        self.vault_kv_mount = mount.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let vurl = "https://localhost:8200".to_string();
        let args = GlobalArgs::new(vurl);
        assert_eq!(args.vault_url, "https://localhost:8200");
        assert_eq!(args.vault_token.expose_secret(), "");
        assert_eq!(args.vault_kv_mount, "secret");
    }

    #[test]
    fn test_global_args_setters() {
        let mut args = GlobalArgs::new("http://vault:8200".to_string());
        args.set_token(SecretString::from("s.token"));
        args.set_kv_mount("auth");
        assert_eq!(args.vault_token.expose_secret(), "s.token");
        assert_eq!(args.vault_kv_mount, "auth");
    }
}
