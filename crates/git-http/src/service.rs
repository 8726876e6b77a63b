use crate::auth::Operation;

/// The two smart-protocol services `git` can run in stateless-rpc mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitService {
    UploadPack,
    ReceivePack,
}

impl GitService {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "git-upload-pack" => Some(GitService::UploadPack),
            "git-receive-pack" => Some(GitService::ReceivePack),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GitService::UploadPack => "git-upload-pack",
            GitService::ReceivePack => "git-receive-pack",
        }
    }

    /// Subcommand passed to the `git` binary.
    pub fn subcommand(self) -> &'static str {
        match self {
            GitService::UploadPack => "upload-pack",
            GitService::ReceivePack => "receive-pack",
        }
    }

    pub fn advertisement_content_type(self) -> &'static str {
        match self {
            GitService::UploadPack => "application/x-git-upload-pack-advertisement",
            GitService::ReceivePack => "application/x-git-receive-pack-advertisement",
        }
    }

    pub fn result_content_type(self) -> &'static str {
        match self {
            GitService::UploadPack => "application/x-git-upload-pack-result",
            GitService::ReceivePack => "application/x-git-receive-pack-result",
        }
    }

    pub fn operation(self) -> Operation {
        match self {
            GitService::UploadPack => Operation::Fetch,
            GitService::ReceivePack => Operation::Push,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_services_only() {
        assert_eq!(GitService::from_name("git-upload-pack"), Some(GitService::UploadPack));
        assert_eq!(GitService::from_name("git-receive-pack"), Some(GitService::ReceivePack));
        assert_eq!(GitService::from_name("upload-pack"), None);
        assert_eq!(GitService::from_name(""), None);
    }

    #[test]
    fn content_types_follow_service_suffix() {
        assert_eq!(
            GitService::ReceivePack.advertisement_content_type(),
            "application/x-git-receive-pack-advertisement"
        );
        assert_eq!(
            GitService::UploadPack.result_content_type(),
            "application/x-git-upload-pack-result"
        );
    }
}
