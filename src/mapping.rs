//! Bilibili field mapping: raw web-API payloads to the flat records the
//! crawler exports (and that `thread`/`integrate` consume). Pure
//! transcription; nothing here looks at thread structure.

use crate::error::ThreadError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

const TEXT_LIMIT: usize = 500;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub video_type: String,
    pub title: String,
    pub desc: String,
    pub create_time: i64,
    pub user_id: String,
    pub nickname: String,
    pub avatar: String,
    pub liked_count: String,
    pub disliked_count: String,
    pub video_play_count: String,
    pub video_favorite_count: String,
    pub video_share_count: String,
    pub video_coin_count: String,
    pub video_danmaku: String,
    pub video_comment: String,
    pub last_modify_ts: i64,
    pub video_url: String,
    pub video_cover_url: String,
    pub source_keyword: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatorRecord {
    pub user_id: String,
    pub nickname: String,
    pub sex: String,
    pub sign: String,
    pub avatar: String,
    pub last_modify_ts: i64,
    pub total_fans: i64,
    pub total_liked: i64,
    pub user_rank: i64,
    pub is_official: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommentRow {
    pub comment_id: String,
    pub parent_comment_id: String, // "0" for top-level
    pub create_time: i64,
    pub video_id: String,
    pub content: String,
    pub user_id: String,
    pub nickname: String,
    pub sex: String,
    pub sign: String,
    pub avatar: String,
    pub sub_comment_count: String,
    pub like_count: i64,
    pub last_modify_ts: i64,
}

/// One side of a follow relation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContactParty {
    pub id: String,
    pub name: String,
    pub sign: String,
    pub avatar: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub up_id: String,
    pub fan_id: String,
    pub up_name: String,
    pub fan_name: String,
    pub up_sign: String,
    pub fan_sign: String,
    pub up_avatar: String,
    pub fan_avatar: String,
    pub last_modify_ts: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DynamicRecord {
    pub dynamic_id: String,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub pub_ts: i64,
    pub total_comments: i64,
    pub total_forwards: i64,
    pub total_liked: i64,
    pub last_modify_ts: i64,
}

/// Milliseconds since the epoch, the unit crawler exports stamp records with.
pub fn now_ts() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn at<'v>(v: &'v Value, path: &[&str]) -> Option<&'v Value> {
    path.iter().try_fold(v, |cur, key| cur.get(*key))
}

fn required<'v>(v: &'v Value, path: &[&str], entity: &'static str) -> Result<&'v Value, ThreadError> {
    at(v, path)
        .filter(|x| !x.is_null())
        .ok_or_else(|| ThreadError::MissingProviderField { entity, path: path.join(".") })
}

/// Text form of a scalar; missing and null become "".
fn text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Integer form of a scalar; numeric strings are accepted, anything else is 0.
fn int(v: Option<&Value>) -> i64 {
    match v {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn clip(s: String) -> String {
    match s.char_indices().nth(TEXT_LIMIT) {
        Some((cut, _)) => s[..cut].to_string(),
        None => s,
    }
}

/// Map a video detail payload (`{"View": {...}, ...}`).
pub fn video_from_view(raw: &Value, source_keyword: &str, now: i64) -> Result<VideoRecord, ThreadError> {
    const E: &str = "bilibili video";
    let view = required(raw, &["View"], E)?;
    let video_id = text(Some(required(view, &["aid"], E)?));
    let owner = view.get("owner");
    let stat = view.get("stat");
    let owner_f = |k: &str| text(owner.and_then(|o| o.get(k)));
    let stat_f = |k: &str| text(stat.and_then(|s| s.get(k)));

    Ok(VideoRecord {
        video_type: "video".into(),
        title: clip(text(view.get("title"))),
        desc: clip(text(view.get("desc"))),
        create_time: int(view.get("pubdate")),
        user_id: owner_f("mid"),
        nickname: owner_f("name"),
        avatar: owner_f("face"),
        liked_count: stat_f("like"),
        disliked_count: stat_f("dislike"),
        video_play_count: stat_f("view"),
        video_favorite_count: stat_f("favorite"),
        video_share_count: stat_f("share"),
        video_coin_count: stat_f("coin"),
        video_danmaku: stat_f("danmaku"),
        video_comment: stat_f("reply"),
        last_modify_ts: now,
        video_url: format!("https://www.bilibili.com/video/av{video_id}"),
        video_cover_url: text(view.get("pic")),
        source_keyword: source_keyword.to_string(),
        video_id,
    })
}

/// Map an uploader card payload (`{"Card": {"card": {...}, "like_num": N}}`).
pub fn creator_from_card(raw: &Value, now: i64) -> Result<CreatorRecord, ThreadError> {
    const E: &str = "bilibili creator";
    let outer = required(raw, &["Card"], E)?;
    let card = required(outer, &["card"], E)?;
    Ok(CreatorRecord {
        user_id: text(Some(required(card, &["mid"], E)?)),
        nickname: text(card.get("name")),
        sex: text(card.get("sex")),
        sign: text(card.get("sign")),
        avatar: text(card.get("face")),
        last_modify_ts: now,
        total_fans: int(card.get("fans")),
        total_liked: int(outer.get("like_num")),
        user_rank: int(at(card, &["level_info", "current_level"])),
        is_official: int(at(card, &["official_verify", "type"])),
    })
}

/// Map one entry of a reply page. Top-level replies carry `parent == 0`.
pub fn comment_from_reply(video_id: &str, raw: &Value, now: i64) -> Result<CommentRow, ThreadError> {
    const E: &str = "bilibili comment";
    let comment_id = text(Some(required(raw, &["rpid"], E)?));
    let parent = match raw.get("parent") {
        None | Some(Value::Null) => "0".to_string(),
        p => text(p),
    };
    let member = raw.get("member");
    let member_f = |k: &str| text(member.and_then(|m| m.get(k)));
    Ok(CommentRow {
        comment_id,
        parent_comment_id: parent,
        create_time: int(raw.get("ctime")),
        video_id: video_id.to_string(),
        content: text(at(raw, &["content", "message"])),
        user_id: member_f("mid"),
        nickname: member_f("uname"),
        sex: member_f("sex"),
        sign: member_f("sign"),
        avatar: member_f("avatar"),
        sub_comment_count: int(raw.get("rcount")).to_string(),
        like_count: int(raw.get("like")),
        last_modify_ts: now,
    })
}

/// Map a whole reply page, stopping at the first malformed entry.
pub fn comments_from_replies(video_id: &str, replies: &[Value], now: i64) -> Result<Vec<CommentRow>, ThreadError> {
    replies.iter().map(|r| comment_from_reply(video_id, r, now)).collect()
}

impl ContactParty {
    /// From a fan/following list entry (`mid`, `uname`, `sign`, `face`).
    pub fn from_member(raw: &Value) -> Result<Self, ThreadError> {
        Ok(Self {
            id: text(Some(required(raw, &["mid"], "bilibili contact")?)),
            name: text(raw.get("uname")),
            sign: text(raw.get("sign")),
            avatar: text(raw.get("face")),
        })
    }
}

pub fn contact_from_pair(up: &ContactParty, fan: &ContactParty, now: i64) -> ContactRecord {
    ContactRecord {
        up_id: up.id.clone(),
        fan_id: fan.id.clone(),
        up_name: up.name.clone(),
        fan_name: fan.name.clone(),
        up_sign: up.sign.clone(),
        fan_sign: fan.sign.clone(),
        up_avatar: up.avatar.clone(),
        fan_avatar: fan.avatar.clone(),
        last_modify_ts: now,
    }
}

/// `creator` is followed by every entry in `fans`.
pub fn contacts_for_fans(creator: &ContactParty, fans: &[Value], now: i64) -> Result<Vec<ContactRecord>, ThreadError> {
    fans.iter()
        .map(|f| Ok(contact_from_pair(creator, &ContactParty::from_member(f)?, now)))
        .collect()
}

/// `creator` follows every entry in `followings`, so the roles flip.
pub fn contacts_for_followings(creator: &ContactParty, followings: &[Value], now: i64) -> Result<Vec<ContactRecord>, ThreadError> {
    followings
        .iter()
        .map(|f| Ok(contact_from_pair(&ContactParty::from_member(f)?, creator, now)))
        .collect()
}

/// Map one item of a creator's dynamic feed.
pub fn dynamic_from_item(creator: &ContactParty, raw: &Value, now: i64) -> Result<DynamicRecord, ThreadError> {
    const E: &str = "bilibili dynamic";
    let dynamic_id = text(Some(required(raw, &["id_str"], E)?));
    let modules = required(raw, &["modules"], E)?;
    let kind_raw = text(raw.get("type"));
    let kind = kind_raw.rsplit('_').next().unwrap_or_default().to_string();
    let stat = |k: &str| int(at(modules, &["module_stat", k, "count"]));
    Ok(DynamicRecord {
        dynamic_id,
        user_id: creator.id.clone(),
        user_name: creator.name.clone(),
        text: text(at(modules, &["module_dynamic", "desc", "text"])),
        kind,
        pub_ts: int(at(modules, &["module_author", "pub_ts"])),
        total_comments: stat("comment"),
        total_forwards: stat("forward"),
        total_liked: stat("like"),
        last_modify_ts: now,
    })
}
