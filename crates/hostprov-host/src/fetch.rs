//! Fetching content onto the host: HTTP downloads and git checkouts

use hostprov_exec::quote;

pub(crate) fn download_cmd(url: &str, dest: &str) -> String {
    format!("curl -fsSL -o {} {}", quote(dest), quote(url))
}

pub(crate) fn clone_cmd(repo: &str, dest: &str, version: &str, single_branch: bool) -> String {
    let single = if single_branch { " --single-branch" } else { "" };
    format!(
        "git clone{single} --branch {} -- {} {}",
        quote(version),
        quote(repo),
        quote(dest)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_cmd() {
        assert_eq!(
            clone_cmd(
                "https://github.com/vatesfr/xen-orchestra",
                "/opt/xen-orchestra",
                "master",
                true
            ),
            "git clone --single-branch --branch master -- https://github.com/vatesfr/xen-orchestra /opt/xen-orchestra"
        );
    }

    #[test]
    fn test_download_cmd() {
        assert_eq!(
            download_cmd("https://example.org/install.sh", "/tmp/nvm-install.sh"),
            "curl -fsSL -o /tmp/nvm-install.sh https://example.org/install.sh"
        );
    }
}
