//! Built-in platform definitions.
//!
//! Marker lists reflect what each site rendered for existing and missing
//! profiles when they were last verified; sites change their markup, so
//! expect to revisit these.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::evidence::Evidence;
use super::facebook::FacebookDetector;
use super::marker::MarkerDetector;
use super::mastodon::MastodonDetector;
use super::{Detector, Precedence};

static GITLAB_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<h1>[\w\-]+").expect("invalid gitlab heading regex"));

/// Found on 200 with a profile marker, not found on 404 or an absence marker.
fn markers(key: &str, name: &str, url: &str, found: &[&str], not_found: &[&str]) -> MarkerDetector {
    MarkerDetector::builder(key, name)
        .url(url)
        .found(Evidence::all([Evidence::status(200), Evidence::markers(found)]))
        .not_found(Evidence::any([Evidence::status(404), Evidence::markers(not_found)]))
        .build()
}

/// Like [`markers`], but an absence marker also vetoes a found verdict.
fn guarded(key: &str, name: &str, url: &str, found: &[&str], not_found: &[&str]) -> MarkerDetector {
    MarkerDetector::builder(key, name)
        .url(url)
        .found(Evidence::all([
            Evidence::status(200),
            Evidence::not(Evidence::markers(not_found)),
            Evidence::markers(found),
        ]))
        .not_found(Evidence::any([Evidence::status(404), Evidence::markers(not_found)]))
        .build()
}

/// Like [`guarded`], but anything other than 200 counts as not found.
fn strict(key: &str, name: &str, url: &str, found: &[&str], not_found: &[&str]) -> MarkerDetector {
    MarkerDetector::builder(key, name)
        .url(url)
        .found(Evidence::all([
            Evidence::status(200),
            Evidence::not(Evidence::markers(not_found)),
            Evidence::markers(found),
        ]))
        .not_found(Evidence::any([
            Evidence::status_other_than(200),
            Evidence::markers(not_found),
        ]))
        .build()
}

/// Found on 200 when `found` holds, not found only on 404.
fn status_only(key: &str, name: &str, url: &str, found: Evidence) -> MarkerDetector {
    MarkerDetector::builder(key, name)
        .url(url)
        .found(Evidence::all([Evidence::status(200), found]))
        .not_found(Evidence::status(404))
        .build()
}

fn github() -> MarkerDetector {
    markers(
        "github",
        "GitHub",
        "https://github.com/{handle}",
        &[
            r#""login":"#,
            r#""avatar_url":"#,
            r#"data-hovercard-type="user""#,
            r#"class="p-name vcard-fullname"#,
        ],
        &[
            "Not Found",
            "This is not the web page you are looking for",
            "Page not found",
        ],
    )
}

fn gitlab() -> MarkerDetector {
    status_only(
        "gitlab",
        "GitLab",
        "https://gitlab.com/{handle}",
        Evidence::pattern(GITLAB_HEADING_RE.clone()),
    )
}

fn reddit() -> MarkerDetector {
    // "u/" is left out: it appears on every profile page.
    const NOT_FOUND: &[&str] = &[
        "page not found",
        "Sorry, nobody on Reddit goes by that name",
        "This account has been suspended",
    ];
    MarkerDetector::builder("reddit", "Reddit")
        .url("https://www.reddit.com/user/{handle}")
        .found(Evidence::all([
            Evidence::status(200),
            Evidence::markers(&[r#""id":"t2_"#, r#""isLoggedInUser""#, "data-user-id", r#""karma":"#]),
            Evidence::not(Evidence::markers(NOT_FOUND)),
        ]))
        .not_found(Evidence::any([Evidence::status(404), Evidence::markers_ci(NOT_FOUND)]))
        .build()
}

fn instagram() -> MarkerDetector {
    guarded(
        "instagram",
        "Instagram",
        "https://www.instagram.com/{handle}/",
        &[
            r#""username":""#,
            r#""profile_pic_url""#,
            r#""biography""#,
            r#""edge_owner_to_timeline_media""#,
            r#""is_private""#,
            r#"property="og:title""#,
        ],
        &[
            "Sorry, this page isn't available",
            "The link you followed may be broken",
            "this page is not available",
        ],
    )
}

fn tiktok() -> MarkerDetector {
    guarded(
        "tiktok",
        "TikTok",
        "https://www.tiktok.com/@{handle}",
        &[
            r#""uniqueId":""#,
            r#""__typename":"User""#,
            r#""followerCount":"#,
            r#""videoCount":"#,
        ],
        &[
            "Couldn't find this account",
            "Impossible de trouver ce compte",
            "<h1>404</h1>",
            r#""statusCode":10202"#,
        ],
    )
}

fn linkedin() -> MarkerDetector {
    guarded(
        "linkedin",
        "LinkedIn",
        "https://www.linkedin.com/in/{handle}",
        &[
            r#""profile":"#,
            r#""publicIdentifier":""#,
            r#""firstName":""#,
            r#""lastName":""#,
            r#""profilePicture":"#,
            r#"property="og:title""#,
        ],
        &[
            "This page doesn't exist",
            "Page not found",
            "profile-unavailable",
            r#""status":404"#,
        ],
    )
}

fn pastebin() -> MarkerDetector {
    status_only(
        "pastebin",
        "Pastebin",
        "https://pastebin.com/u/{handle}",
        Evidence::markers_ci(&["pastebin.com"]),
    )
}

fn telegram() -> MarkerDetector {
    // Unknown handles bounce to the telegram.org landing page.
    let landing = || Evidence::final_url_starts_with("https://telegram.org");
    MarkerDetector::builder("telegram", "Telegram")
        .url("https://t.me/{handle}")
        .found(Evidence::all([
            Evidence::status(200),
            Evidence::not(landing()),
            Evidence::any([
                Evidence::markers(&[r#""@type":"Person""#, r#""@type":"Organization""#]),
                Evidence::all([
                    Evidence::marker("og:image"),
                    Evidence::marker("cdn"),
                    Evidence::not(Evidence::markers(&["telegram_logo", "default"])),
                ]),
                Evidence::all([
                    Evidence::marker(r#"property="og:title""#),
                    Evidence::marker(r#"property="og:description""#),
                    Evidence::handle_in_body_ci(),
                ]),
            ]),
        ]))
        .not_found(Evidence::any([Evidence::status(404), landing()]))
        .build()
}

fn snapchat() -> MarkerDetector {
    MarkerDetector::builder("snapchat", "Snapchat")
        .url("https://www.snapchat.com/add/{handle}")
        .found(Evidence::all([Evidence::status(200), Evidence::marker("Snapcode")]))
        .not_found(Evidence::any([
            Evidence::status(404),
            Evidence::not(Evidence::marker("Snapcode")),
        ]))
        .build()
}

fn strava() -> MarkerDetector {
    status_only(
        "strava",
        "Strava",
        "https://www.strava.com/athletes/{handle}",
        Evidence::any([Evidence::marker("Athlete"), Evidence::handle_in_body()]),
    )
}

fn threads() -> MarkerDetector {
    strict(
        "threads",
        "Threads",
        "https://www.threads.net/@{handle}",
        &[r#""user":{"pk""#, r#""profile_pic_url""#, r#""thread_items""#],
        &["Sorry, this page isn't available", "User not found"],
    )
}

fn bluesky() -> MarkerDetector {
    MarkerDetector::builder("bluesky", "Bluesky")
        .urls([
            "https://bsky.app/profile/{handle}.bsky.social",
            "https://bsky.app/profile/{handle}",
        ])
        .found(Evidence::all([
            Evidence::status(200),
            Evidence::any([Evidence::handle_in_body(), Evidence::marker("Posts")]),
        ]))
        .not_found(Evidence::status(404))
        .precedence(Precedence::FoundFirst)
        .build()
}

fn spotify() -> MarkerDetector {
    status_only(
        "spotify",
        "Spotify",
        "https://open.spotify.com/user/{handle}",
        Evidence::handle_in_body_ci(),
    )
}

fn soundcloud() -> MarkerDetector {
    status_only(
        "soundcloud",
        "SoundCloud",
        "https://soundcloud.com/{handle}",
        Evidence::any([Evidence::markers_ci(&["soundcloud"]), Evidence::handle_in_body_ci()]),
    )
}

fn youtube() -> MarkerDetector {
    const NOT_FOUND: &[&str] = &["This page isn't available", "404 Not Found"];
    MarkerDetector::builder("youtube", "YouTube")
        .urls([
            "https://www.youtube.com/@{handle}",
            "https://www.youtube.com/c/{handle}",
            "https://www.youtube.com/user/{handle}",
        ])
        .found(Evidence::all([
            Evidence::status(200),
            Evidence::not(Evidence::markers(NOT_FOUND)),
            Evidence::markers(&[
                r#""channelId":""#,
                r#""subscriberCountText""#,
                r#""viewCountText""#,
                r#""videoCount""#,
                r#""@type":"Person""#,
                r#""externalId":"UC"#,
            ]),
        ]))
        .not_found(Evidence::any([Evidence::status(404), Evidence::markers(NOT_FOUND)]))
        .build()
}

fn twitter() -> MarkerDetector {
    const NOT_FOUND: &[&str] = &[
        "This account doesn't exist",
        "Hmm...this page doesn't exist",
        "User not found",
        "page_not_found",
    ];
    MarkerDetector::builder("twitter", "Twitter/X")
        .url("https://x.com/{handle}")
        .found(Evidence::all([
            Evidence::status(200),
            Evidence::not(Evidence::markers(NOT_FOUND)),
            Evidence::any([
                Evidence::templated_ci(r#""screen_name":"{handle}""#),
                Evidence::markers(&[
                    r#"og:url" content="https://twitter.com/"#,
                    r#"og:url" content="https://x.com/"#,
                ]),
                Evidence::not(Evidence::header_equals("x-twitter-response-tags", "OverCapacity")),
            ]),
        ]))
        .not_found(Evidence::any([Evidence::status(404), Evidence::markers(NOT_FOUND)]))
        .build()
}

fn medium() -> MarkerDetector {
    guarded(
        "medium",
        "Medium",
        "https://medium.com/@{handle}",
        &[
            r#""@type":"Person""#,
            r#""creator":{"@type":"Person""#,
            r#""UserFollowButton""#,
        ],
        &["We couldn't find this page", "PAGE NOT FOUND", "404"],
    )
}

fn hackerone() -> MarkerDetector {
    guarded(
        "hackerone",
        "HackerOne",
        "https://hackerone.com/{handle}",
        &[
            r#""username":"#,
            "hacker-profile",
            "profile__intro",
            r#""reputation":"#,
            r#"class="report-count"#,
            r#""signal":"#,
        ],
        &[
            "No account was found",
            "Page not found",
            "Something went wrong",
            r#""error":"not_found""#,
        ],
    )
}

fn npm() -> MarkerDetector {
    MarkerDetector::builder("npm", "npm")
        .url("https://www.npmjs.com/~{handle}")
        .found(Evidence::all([
            Evidence::status(200),
            Evidence::not(Evidence::markers(&[
                "We cannot find the page you are looking for",
                "404",
                "does not exist",
            ])),
            Evidence::markers(&["packages by", r#""author""#, r#"class="w-third"#, r#"class="b db f5"#]),
        ]))
        .not_found(Evidence::status(404))
        .build()
}

fn keybase() -> MarkerDetector {
    strict(
        "keybase",
        "Keybase",
        "https://keybase.io/{handle}",
        &[r#""proofs_summary""#, r#""stellar""#, r#""bitcoin""#],
        &["User not found", "No such user", "404"],
    )
}

fn pinterest() -> MarkerDetector {
    strict(
        "pinterest",
        "Pinterest",
        "https://www.pinterest.com/{handle}/",
        &[
            r#""@type":"Person""#,
            r#""profileOwner":"#,
            r#""pinterestapp:followers""#,
        ],
        &["User not found", "Sorry! We couldn't find", "Oops! We couldn't find"],
    )
}

fn steam() -> MarkerDetector {
    const MISSING: &str = "The specified profile could not be found";
    MarkerDetector::builder("steam", "Steam")
        .url("https://steamcommunity.com/id/{handle}")
        .found(Evidence::all([
            Evidence::status_other_than(404),
            Evidence::not(Evidence::marker(MISSING)),
            Evidence::any([
                Evidence::marker(r#"class="profile_header_bg""#),
                Evidence::handle_in_body_ci(),
            ]),
        ]))
        .not_found(Evidence::any([Evidence::status(404), Evidence::marker(MISSING)]))
        .build()
}

fn chessdotcom() -> MarkerDetector {
    status_only(
        "chessdotcom",
        "Chess.com",
        "https://www.chess.com/member/{handle}",
        Evidence::all([Evidence::handle_in_body_ci(), Evidence::markers_ci(&["chess.com"])]),
    )
}

fn vimeo() -> MarkerDetector {
    const NOT_FOUND: &[&str] = &["Sorry, we couldn't find that page", "Page not found"];
    MarkerDetector::builder("vimeo", "Vimeo")
        .url("https://vimeo.com/{handle}")
        .found(Evidence::all([
            Evidence::status_other_than(404),
            Evidence::not(Evidence::markers(NOT_FOUND)),
            Evidence::handle_in_body_ci(),
        ]))
        .not_found(Evidence::any([Evidence::status(404), Evidence::markers(NOT_FOUND)]))
        .build()
}

fn linktree() -> MarkerDetector {
    const NOT_FOUND: &[&str] = &["Sorry, this page isn't available", "404"];
    MarkerDetector::builder("linktree", "Linktree")
        .url("https://linktr.ee/{handle}")
        .found(Evidence::all([
            Evidence::status(200),
            Evidence::not(Evidence::markers(NOT_FOUND)),
            Evidence::any([Evidence::handle_in_body_ci(), Evidence::markers_ci(&["linktr.ee"])]),
        ]))
        .not_found(Evidence::any([
            Evidence::status_other_than(200),
            Evidence::markers(NOT_FOUND),
        ]))
        .build()
}

fn deviantart() -> MarkerDetector {
    const NOT_FOUND: &[&str] = &["doesn't exist", "The page you're looking for"];
    MarkerDetector::builder("deviantart", "DeviantArt")
        .url("https://www.deviantart.com/{handle}")
        .found(Evidence::all([
            Evidence::status_other_than(404),
            Evidence::not(Evidence::markers(NOT_FOUND)),
            Evidence::any([Evidence::handle_in_body_ci(), Evidence::marker("deviantart.com")]),
        ]))
        .not_found(Evidence::any([Evidence::status(404), Evidence::markers(NOT_FOUND)]))
        .build()
}

fn vk() -> MarkerDetector {
    const NOT_FOUND: &[&str] = &[
        "Profile not found",
        "страница удалена",
        "страница не найдена",
        "is unavailable",
        "has been deleted",
    ];
    MarkerDetector::builder("vk", "VK")
        .url("https://vk.com/{handle}")
        .found(Evidence::all([
            Evidence::status(200),
            Evidence::not(Evidence::markers_ci(NOT_FOUND)),
            Evidence::any([
                Evidence::markers(&[r#"<div class="page_name""#, "wall_tab_all"]),
                Evidence::handle_in_body_ci(),
            ]),
        ]))
        .not_found(Evidence::any([
            Evidence::status_other_than(200),
            Evidence::markers_ci(NOT_FOUND),
        ]))
        .build()
}

fn rumble() -> MarkerDetector {
    markers(
        "rumble",
        "Rumble",
        "https://rumble.com/c/{handle}",
        &[
            r#"class="channel-header"#,
            r#""@type":"Person""#,
            r#"class="channel-subheader"#,
            "data-channel-id=",
            "subscribers",
        ],
        &[
            "Page not found",
            "404 Not Found",
            "Channel not found",
            "This channel does not exist",
        ],
    )
}

fn bitchute() -> MarkerDetector {
    markers(
        "bitchute",
        "BitChute",
        "https://www.bitchute.com/channel/{handle}/",
        &[
            r#"class="channel-banner"#,
            r#"class="owner"#,
            "channel-videos",
            "subscriber-count",
            r#"class="name""#,
        ],
        &[
            "Channel Not Found",
            "This channel does not exist",
            "Page Not Found",
            "404",
        ],
    )
}

const SOCIAL_NOT_FOUND: &[&str] = &[
    "This page isn't available",
    "Account not found",
    "The page you requested does not exist",
    "Sorry, that page doesn't exist",
];

fn gab() -> MarkerDetector {
    markers(
        "gab",
        "Gab",
        "https://gab.com/{handle}",
        &[
            r#""@type":"Person""#,
            r#"class="account__header"#,
            r#"class="display-name"#,
            "data-account-id",
            "followers",
            "following",
        ],
        SOCIAL_NOT_FOUND,
    )
}

fn truthsocial() -> MarkerDetector {
    let not_found: Vec<&str> = SOCIAL_NOT_FOUND.iter().copied().chain(["404"]).collect();
    markers(
        "truthsocial",
        "Truth Social",
        "https://truthsocial.com/@{handle}",
        &[
            r#""@type":"Person""#,
            r#"class="account__header"#,
            r#"class="display-name"#,
            "data-account-id",
            "followers",
            "truths",
        ],
        &not_found,
    )
}

fn gettr() -> MarkerDetector {
    markers(
        "gettr",
        "Gettr",
        "https://gettr.com/user/{handle}",
        &[
            r#""username":"#,
            r#"class="profile-bio"#,
            r#"class="user-card"#,
            "followers",
            "following",
            r#""ousrname":"#,
        ],
        &["User not found", "This user doesn't exist", "Page not found", "404"],
    )
}

fn researchgate() -> MarkerDetector {
    markers(
        "researchgate",
        "ResearchGate",
        "https://www.researchgate.net/profile/{handle}",
        &[
            r#"class="nova-legacy-e-text nova-legacy-e-text--size-xl"#,
            r#""@type":"Person""#,
            r#"class="researcher-profile"#,
            "publications",
            "research-interest",
            r#"class="profile-header"#,
        ],
        &[
            "Page not found",
            "The page you were looking for doesn't exist",
            "This profile is not available",
            "404",
        ],
    )
}

fn academia() -> MarkerDetector {
    markers(
        "academia",
        "Academia.edu",
        "https://independent.academia.edu/{handle}",
        &[
            r#"class="profile-name"#,
            r#""@type":"Person""#,
            r#"class="profile-header"#,
            "papers",
            "followers",
            r#"class="js-profile"#,
        ],
        &[
            "Page not found",
            "This profile doesn't exist",
            "The page you were looking for doesn't exist",
            "404 Not Found",
        ],
    )
}

fn behance() -> MarkerDetector {
    markers(
        "behance",
        "Behance",
        "https://www.behance.net/{handle}",
        &[
            r#"class="Profile-"#,
            r#""@type":"Person""#,
            r#"class="UserInfo"#,
            "Appreciations",
            "Projects",
            r#"class="js-mini-profile"#,
        ],
        &[
            "Page not found",
            "Oops! We can't find that page",
            "This page doesn't exist",
            "404",
        ],
    )
}

fn dribbble() -> MarkerDetector {
    markers(
        "dribbble",
        "Dribbble",
        "https://dribbble.com/{handle}",
        &[
            r#"class="profile-info"#,
            r#""@type":"Person""#,
            r#"class="bio"#,
            "Shots",
            "Followers",
            r#"class="shot-thumbnail"#,
        ],
        &[
            "Page not found",
            "Sorry, this page isn't available",
            "404 Not Found",
            "This page doesn't exist",
        ],
    )
}

/// All built-in detectors in display order.
pub fn builtin_detectors() -> Vec<Arc<dyn Detector>> {
    vec![
        Arc::new(github()),
        Arc::new(gitlab()),
        Arc::new(reddit()),
        Arc::new(instagram()),
        Arc::new(tiktok()),
        Arc::new(linkedin()),
        Arc::new(pastebin()),
        Arc::new(telegram()),
        Arc::new(snapchat()),
        Arc::new(strava()),
        Arc::new(threads()),
        Arc::new(MastodonDetector::default()),
        Arc::new(bluesky()),
        Arc::new(spotify()),
        Arc::new(soundcloud()),
        Arc::new(youtube()),
        Arc::new(twitter()),
        Arc::new(FacebookDetector::new()),
        Arc::new(medium()),
        Arc::new(hackerone()),
        Arc::new(npm()),
        Arc::new(keybase()),
        Arc::new(pinterest()),
        Arc::new(steam()),
        Arc::new(chessdotcom()),
        Arc::new(vimeo()),
        Arc::new(linktree()),
        Arc::new(deviantart()),
        Arc::new(vk()),
        Arc::new(rumble()),
        Arc::new(bitchute()),
        Arc::new(gab()),
        Arc::new(truthsocial()),
        Arc::new(gettr()),
        Arc::new(researchgate()),
        Arc::new(academia()),
        Arc::new(behance()),
        Arc::new(dribbble()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::core::ProbeResponse;
    use crate::checks::detectors::{Verdict, classify};
    use http::{HeaderMap, HeaderValue};
    use url::Url;

    fn response(url: &str, status: u16, body: &str) -> ProbeResponse {
        ProbeResponse::new(Url::parse(url).unwrap(), status, HeaderMap::new(), body)
    }

    #[test]
    fn github_markers() {
        let detector = github();
        let url = "https://github.com/alice";
        assert_eq!(
            classify(&detector, &response(url, 200, r#"{"login":"alice"}"#), "alice"),
            Verdict::Found
        );
        assert_eq!(classify(&detector, &response(url, 404, ""), "alice"), Verdict::NotFound);
        assert_eq!(
            classify(&detector, &response(url, 200, "<html>plain</html>"), "alice"),
            Verdict::Inconclusive
        );
    }

    #[test]
    fn telegram_landing_redirect_is_not_found() {
        let detector = telegram();
        let landing = response("https://telegram.org/", 200, r#""@type":"Person""#);
        assert_eq!(classify(&detector, &landing, "alice"), Verdict::NotFound);

        let profile = response(
            "https://t.me/alice",
            200,
            r#"<meta property="og:title" content="Alice"><meta property="og:description" content="@alice">"#,
        );
        assert_eq!(classify(&detector, &profile, "alice"), Verdict::Found);
    }

    #[test]
    fn reddit_profile_is_not_vetoed_by_its_own_url() {
        let detector = reddit();
        let page = response(
            "https://www.reddit.com/user/alice",
            200,
            r#"<a href="/u/alice">u/alice</a> "karma": 12"#,
        );
        assert_eq!(classify(&detector, &page, "alice"), Verdict::Found);

        let missing = response(
            "https://www.reddit.com/user/alice",
            200,
            "Sorry, nobody on Reddit goes by that name",
        );
        assert_eq!(classify(&detector, &missing, "alice"), Verdict::NotFound);
    }

    #[test]
    fn twitter_over_capacity_is_not_found_evidence() {
        let detector = twitter();
        let mut headers = HeaderMap::new();
        headers.insert("x-twitter-response-tags", HeaderValue::from_static("OverCapacity"));
        let busy = ProbeResponse::new(Url::parse("https://x.com/alice").unwrap(), 200, headers, "");
        assert_eq!(classify(&detector, &busy, "alice"), Verdict::Inconclusive);

        let profile = response("https://x.com/alice", 200, r#"{"screen_name":"Alice"}"#);
        assert_eq!(classify(&detector, &profile, "alice"), Verdict::Found);

        let gone = response("https://x.com/alice", 200, "This account doesn't exist");
        assert_eq!(classify(&detector, &gone, "alice"), Verdict::NotFound);
    }

    #[test]
    fn bluesky_prefers_found() {
        let detector = bluesky();
        assert_eq!(detector.precedence(), Precedence::FoundFirst);
        assert_eq!(detector.profile_url("alice"), "https://bsky.app/profile/alice.bsky.social");
        assert_eq!(detector.urls("alice").len(), 2);
    }

    #[test]
    fn gitlab_heading() {
        let detector = gitlab();
        let url = "https://gitlab.com/alice";
        assert!(detector.detect_found(&response(url, 200, "<h1>alice</h1>"), "alice"));
        assert!(!detector.detect_found(&response(url, 200, "<h2>x</h2>"), "alice"));
    }

    #[test]
    fn every_builtin_has_https_urls() {
        for detector in builtin_detectors() {
            let urls = detector.urls("alice");
            assert!(!urls.is_empty(), "{} has no urls", detector.key());
            for url in urls {
                assert!(url.starts_with("https://"), "{url}");
                assert!(url.contains("alice"), "{url}");
                Url::parse(&url).unwrap();
            }
            assert_eq!(detector.key(), detector.key().to_lowercase());
        }
    }
}
