//! Popular emails and names excluded from heuristic matching.
//!
//! A value is "popular" when too many unrelated people share it for a match
//! to imply a shared identity: bot accounts, placeholder addresses, generic
//! display names. Lookups are case-insensitive.

use std::collections::HashSet;

/// Bot and placeholder addresses that show up across many unrelated projects.
const BUILTIN_POPULAR_EMAILS: &[&str] = &[
    "noreply@github.com",
    "noreply-awscodestar@amazon.com",
    "nobody@amazon.com",
    "you@example.com",
    "obsidian-leadership@redhat.com",
    "commit-bot@chromium.org",
    "snyk-bot@snyk.io",
    "eloy.de.enige+cocoapods.github.bot@gmail.com",
    "support@dependabot.com",
    "deploy@travis-ci.org",
    "bot@renovateapp.com",
    "whitesource-bolt-for-github[bot]@users.noreply.github.com",
    "DevExpressExampleBot@users.noreply.github.com",
    "facebook-github-bot@users.noreply.github.com",
    "greenkeeper[bot]@users.noreply.github.com",
    "support@forestry.io",
    "keks@htmlacademy.ru",
    "ghost@gitbook.com",
    "admin@example.com",
    "jenkins-x@googlegroups.com",
    "circleci@cf-graph.regro.github.com",
    "android-build-merger@google.com",
    "k8s-ci-robot@users.noreply.github.com",
    "contact@jsdelivr.com",
    "travis@example.org",
    "gardener@tensorflow.org",
    "badger@codacy.com",
    "noreply-gerritcodereview@google.com",
    "hosted@weblate.org",
    "unconfigured@null.spigotmc.org",
    "ImgBotHelp@gmail.com",
    "bot@siteleaf.com",
    "team@crowdbotics.com",
    "gnome-sysadmin@gnome.org",
    "noreply@weblate.org",
    "pontoon@mozilla.com",
    "github-bot@pyup.io",
    "azure-pipelines[bot]@users.noreply.github.com",
    "cppanbot@gmail.com",
    "unknown@example.com",
    "bot@styleci.io",
    "jhipster-bot@jhipster.tech",
    "badges@fossa.io",
    "angular-cli@angular.io",
    "review@openstack.org",
    "ci-automated-tests@broadinstitute.org",
    "k8s-publishing-bot@users.noreply.github.com",
    "travis@travis-ci.org",
    "example@example.com",
    "hello@yotako.io",
    "chrome-bot@chromium.org",
    "testbot@balabit.com",
    "renovate[bot]@users.noreply.github.com",
    "semantic-release-bot@martynus.net",
    "no-reply@github.com",
    "noreply@gmail.com",
];

/// Lookup of popular emails and names.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    emails: HashSet<String>,
    names: HashSet<String>,
}

impl Blacklist {
    /// An empty blacklist: nothing is popular.
    pub fn new() -> Self {
        Self::default()
    }

    /// A blacklist pre-filled with the built-in popular emails.
    pub fn builtin() -> Self {
        let mut blacklist = Self::new();
        blacklist.extend_emails(BUILTIN_POPULAR_EMAILS.iter().copied());
        blacklist
    }

    pub fn extend_emails<I, S>(&mut self, emails: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.emails
            .extend(emails.into_iter().map(|e| e.as_ref().to_lowercase()));
    }

    pub fn extend_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.names
            .extend(names.into_iter().map(|n| n.as_ref().to_lowercase()));
    }

    pub fn is_popular_email(&self, email: &str) -> bool {
        self.emails.contains(&email.to_lowercase())
    }

    pub fn is_popular_name(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_contains_bots() {
        let bl = Blacklist::builtin();
        assert!(bl.is_popular_email("noreply@github.com"));
        assert!(bl.is_popular_email("DevExpressExampleBot@users.noreply.github.com"));
        assert!(!bl.is_popular_email("alice@example.org"));
    }

    #[test]
    fn builtin_covers_ci_and_bot_services() {
        let bl = Blacklist::builtin();
        assert_eq!(bl.emails.len(), BUILTIN_POPULAR_EMAILS.len());
        assert_eq!(bl.emails.len(), 56);
        for email in [
            "imgbothelp@gmail.com",
            "jenkins-x@googlegroups.com",
            "circleci@cf-graph.regro.github.com",
            "testbot@balabit.com",
            "Hello@Yotako.io",
        ] {
            assert!(bl.is_popular_email(email), "{email} should be popular");
        }
    }

    #[test]
    fn names_are_case_insensitive() {
        let mut bl = Blacklist::new();
        bl.extend_names(["John Smith"]);
        assert!(bl.is_popular_name("john smith"));
        assert!(!bl.is_popular_name("John Smithers"));
        assert!(!bl.is_popular_email("noreply@github.com"));
    }
}
