//! HTML rendering for notification emails.

use super::EmailMessage;
use crate::tracker_store::{Artist, Release, ReleaseType, User};
use chrono::NaiveDate;

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn type_label(release_type: ReleaseType) -> &'static str {
    match release_type {
        ReleaseType::Album => "album",
        ReleaseType::Single => "single",
        ReleaseType::Ep => "EP",
    }
}

const STYLE: &str = "body { font-family: Arial, sans-serif; background-color: #f4f4f4; \
    margin: 0; padding: 0; } \
    .container { max-width: 600px; margin: 20px auto; background-color: #fff; \
    padding: 30px; border-radius: 8px; } \
    h2 { color: #1DB954; } \
    .release-image { max-width: 300px; border-radius: 8px; margin: 20px 0; } \
    .listen-btn { display: inline-block; background-color: #1DB954; color: white; \
    padding: 12px 24px; text-decoration: none; border-radius: 25px; margin-top: 20px; } \
    .footer { margin-top: 30px; padding-top: 20px; border-top: 1px solid #ddd; \
    font-size: 12px; color: #666; }";

/// Render the immediate new-release notification for one user.
pub fn release_notification_email(user: &User, artist: &Artist, release: &Release) -> EmailMessage {
    let artist_name = escape_html(&artist.name);
    let release_name = escape_html(&release.name);
    let label = type_label(release.release_type);

    let image = match &release.image_url {
        Some(url) => format!(
            r#"<img src="{}" alt="{}" class="release-image">"#,
            escape_html(url),
            release_name
        ),
        None => String::new(),
    };

    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><style>{STYLE}</style></head>
<body>
<div class="container">
  <h2>New release from {artist_name}!</h2>
  <p>Hi {user_name},</p>
  <p>{artist_name} just released a new {label}:</p>
  {image}
  <div>
    <strong>Title:</strong> {release_name}<br>
    <strong>Type:</strong> {label}<br>
    <strong>Release date:</strong> {date}
  </div>
  <a href="{url}" class="listen-btn">Listen now</a>
  <div class="footer">
    <p>You are receiving this email because you follow {artist_name}.</p>
  </div>
</div>
</body>
</html>"#,
        user_name = escape_html(&user.username),
        date = release.release_date.format("%Y-%m-%d"),
        url = escape_html(&release.primary_url),
    );

    EmailMessage {
        to: user.email.clone(),
        subject: format!("New release from {}!", artist.name),
        html_body,
    }
}

/// Render the batch digest for users on daily or weekly frequency: one
/// email listing the releases accumulated since the last batch run.
pub fn batch_notification_email(user: &User, releases: &[(Release, Artist)]) -> EmailMessage {
    let count = releases.len();
    let noun = if count == 1 { "release" } else { "releases" };

    let items: String = releases
        .iter()
        .map(|(release, artist)| {
            format!(
                r#"<div style="padding: 15px; border-bottom: 1px solid #f3f4f6;">
  <strong>{name}</strong> ({label})<br>
  <span style="color: #666;">{artist}</span><br>
  <span style="font-size: 12px; color: #999;">{date}</span><br>
  <a href="{url}" style="color: #1DB954; font-size: 12px;">Listen now</a>
</div>"#,
                name = escape_html(&release.name),
                label = type_label(release.release_type),
                artist = escape_html(&artist.name),
                date = release.release_date.format("%Y-%m-%d"),
                url = escape_html(&release.primary_url),
            )
        })
        .collect();

    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><style>{STYLE}</style></head>
<body>
<div class="container">
  <h2>New releases from your favorite artists</h2>
  <p>Hi {user_name},</p>
  <p>{count} new {noun} since your last update:</p>
  {items}
  <p style="margin-top: 30px;">Happy listening!</p>
</div>
</body>
</html>"#,
        user_name = escape_html(&user.username),
    );

    EmailMessage {
        to: user.email.clone(),
        subject: format!("{} new {} from your favorite artists", count, noun),
        html_body,
    }
}

/// Render the weekly digest listing the week's releases from the user's
/// favorite artists.
pub fn weekly_summary_email(
    user: &User,
    releases: &[(Release, Artist)],
    week_start: NaiveDate,
    week_end: NaiveDate,
) -> EmailMessage {
    let count = releases.len();
    let noun = if count == 1 { "release" } else { "releases" };

    let items: String = releases
        .iter()
        .map(|(release, artist)| {
            let image = match &release.image_url {
                Some(url) => format!(
                    r#"<img src="{}" style="width: 80px; height: 80px; border-radius: 4px; float: left; margin-right: 15px;">"#,
                    escape_html(url)
                ),
                None => String::new(),
            };
            format!(
                r#"<div style="padding: 15px; border-bottom: 1px solid #f3f4f6;">
  {image}
  <div>
    <strong>{name}</strong> ({label})<br>
    <span style="color: #666;">{artist}</span><br>
    <span style="font-size: 12px; color: #999;">{date}</span><br>
    <a href="{url}" style="color: #1DB954; font-size: 12px;">Listen now</a>
  </div>
  <div style="clear: both;"></div>
</div>"#,
                name = escape_html(&release.name),
                label = type_label(release.release_type),
                artist = escape_html(&artist.name),
                date = release.release_date.format("%Y-%m-%d"),
                url = escape_html(&release.primary_url),
            )
        })
        .collect();

    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><style>{STYLE}</style></head>
<body>
<div class="container">
  <h2>Your weekly music recap</h2>
  <p>Hi {user_name},</p>
  <p>Here {verb} the {count} new {noun} from your favorite artists between {start} and {end}:</p>
  {items}
  <p style="margin-top: 30px;">Happy listening!</p>
</div>
</body>
</html>"#,
        user_name = escape_html(&user.username),
        verb = if count == 1 { "is" } else { "are" },
        start = week_start.format("%Y-%m-%d"),
        end = week_end.format("%Y-%m-%d"),
    );

    EmailMessage {
        to: user.email.clone(),
        subject: format!("{} new {} from your favorite artists this week", count, noun),
        html_body,
    }
}
