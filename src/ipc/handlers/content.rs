use crate::ipc::helpers::{
    conn, get_required_str, load, parse_param, require_role, respond, save, to_json, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{
    BlockType, CustomBlock, CustomPage, CustomPageSection, Role, SectionType, SliderImage,
    TARGET_ALL,
};
use crate::store;
use serde::Deserialize;
use serde_json::{json, Value};

fn sort_by_order<T>(items: &mut [T], order: impl Fn(&T) -> i64) {
    items.sort_by_key(|it| order(it));
}

/// Largest `order` an admin may store in either direction.
const ORDER_LIMIT: i64 = 1_000_000_000;

fn order_out_of_range() -> HandlerErr {
    HandlerErr::bad_params(format!("order must be within -{ORDER_LIMIT}..={ORDER_LIMIT}"))
}

fn check_order(order: Option<i64>) -> Result<Option<i64>, HandlerErr> {
    match order {
        Some(o) if !(-ORDER_LIMIT..=ORDER_LIMIT).contains(&o) => Err(order_out_of_range()),
        other => Ok(other),
    }
}

fn next_order(orders: impl Iterator<Item = i64>) -> Result<i64, HandlerErr> {
    match orders.max() {
        None => Ok(1),
        Some(m) => m.checked_add(1).ok_or_else(order_out_of_range),
    }
}

// Slider

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SliderForm {
    title: String,
    image_url: String,
    link: Option<String>,
    active: Option<bool>,
}

fn sliders_list(state: &AppState) -> HandlerResult {
    let user = require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let mut items: Vec<SliderImage> = load(conn)?;
    if user.role != Role::Admin {
        items.retain(|s| s.active);
    }
    sort_by_order(&mut items, |s| s.order);
    Ok(json!({ "sliders": to_json(&items)? }))
}

fn sliders_create(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let form: SliderForm = parse_param(params, "slider")?;
    if form.image_url.trim().is_empty() {
        return Err(HandlerErr::bad_params("missing imageUrl"));
    }
    let mut items: Vec<SliderImage> = load(conn)?;
    let item = SliderImage {
        id: store::generate_id(),
        title: form.title.trim().to_string(),
        image_url: form.image_url.trim().to_string(),
        link: form.link.filter(|l| !l.trim().is_empty()),
        order: next_order(items.iter().map(|s| s.order))?,
        active: form.active.unwrap_or(true),
    };
    items.push(item.clone());
    save(conn, &items)?;
    Ok(json!({ "slider": to_json(&item)? }))
}

fn sliders_update(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let form: SliderForm = parse_param(params, "slider")?;
    if form.image_url.trim().is_empty() {
        return Err(HandlerErr::bad_params("missing imageUrl"));
    }
    let mut items: Vec<SliderImage> = load(conn)?;
    let Some(item) = items.iter_mut().find(|s| s.id == id) else {
        return Err(HandlerErr::not_found("slider image not found"));
    };
    item.title = form.title.trim().to_string();
    item.image_url = form.image_url.trim().to_string();
    item.link = form.link.filter(|l| !l.trim().is_empty());
    if let Some(active) = form.active {
        item.active = active;
    }
    let updated = item.clone();
    save(conn, &items)?;
    Ok(json!({ "slider": to_json(&updated)? }))
}

fn sliders_delete(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let mut items: Vec<SliderImage> = load(conn)?;
    if !store::remove_by_id(&mut items, &id) {
        return Err(HandlerErr::not_found("slider image not found"));
    }
    save(conn, &items)?;
    Ok(json!({ "ok": true }))
}

/// Swaps `order` with the neighbour above or below. Moving past either end
/// is a no-op.
pub fn move_slider(items: &mut [SliderImage], id: &str, up: bool) -> Result<bool, HandlerErr> {
    sort_by_order(items, |s| s.order);
    let Some(idx) = items.iter().position(|s| s.id == id) else {
        return Err(HandlerErr::not_found("slider image not found"));
    };
    let other = match (up, idx) {
        (true, 0) => return Ok(false),
        (true, i) => i - 1,
        (false, i) if i + 1 >= items.len() => return Ok(false),
        (false, i) => i + 1,
    };
    let (a, b) = (items[idx].order, items[other].order);
    items[idx].order = b;
    items[other].order = a;
    if a == b {
        // Equal orders would make the swap invisible.
        let lower = if up { idx } else { other };
        items[lower].order = items[lower]
            .order
            .checked_sub(1)
            .ok_or_else(order_out_of_range)?;
    }
    sort_by_order(items, |s| s.order);
    Ok(true)
}

fn sliders_move(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let up = match get_required_str(params, "direction")?.as_str() {
        "up" => true,
        "down" => false,
        other => return Err(HandlerErr::bad_params(format!("direction must be up or down, got {}", other))),
    };
    let mut items: Vec<SliderImage> = load(conn)?;
    let moved = move_slider(&mut items, &id, up)?;
    if moved {
        save(conn, &items)?;
    }
    Ok(json!({ "moved": moved, "sliders": to_json(&items)? }))
}

// Custom blocks

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BlockForm {
    id: Option<String>,
    title: String,
    #[serde(rename = "type")]
    kind: BlockType,
    content: String,
    order: Option<i64>,
    active: Option<bool>,
    target_grade: Option<String>,
}

fn blocks_list(state: &AppState) -> HandlerResult {
    let user = require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let mut items: Vec<CustomBlock> = load(conn)?;
    if user.role == Role::Student {
        let grade = user.grade_or_empty();
        items.retain(|b| b.active && (b.target_grade == TARGET_ALL || b.target_grade == grade));
    }
    sort_by_order(&mut items, |b| b.order);
    Ok(json!({ "blocks": to_json(&items)? }))
}

fn blocks_upsert(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let form: BlockForm = parse_param(params, "block")?;
    if form.title.trim().is_empty() {
        return Err(HandlerErr::bad_params("missing title"));
    }
    let order = check_order(form.order)?;
    let mut items: Vec<CustomBlock> = load(conn)?;
    let existing = form
        .id
        .as_deref()
        .and_then(|id| store::find_by_id(&items, id))
        .cloned();
    let block = CustomBlock {
        id: existing
            .as_ref()
            .map(|b| b.id.clone())
            .unwrap_or_else(store::generate_id),
        title: form.title.trim().to_string(),
        kind: form.kind,
        content: form.content,
        order: match order.or(existing.as_ref().map(|b| b.order)) {
            Some(o) => o,
            None => next_order(items.iter().map(|b| b.order))?,
        },
        active: form
            .active
            .or(existing.as_ref().map(|b| b.active))
            .unwrap_or(true),
        target_grade: form
            .target_grade
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| TARGET_ALL.to_string()),
    };
    if existing.is_some() {
        store::replace_by_id(&mut items, block.clone());
    } else {
        items.push(block.clone());
    }
    save(conn, &items)?;
    Ok(json!({ "block": to_json(&block)?, "created": existing.is_none() }))
}

fn blocks_delete(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let mut items: Vec<CustomBlock> = load(conn)?;
    if !store::remove_by_id(&mut items, &id) {
        return Err(HandlerErr::not_found("block not found"));
    }
    save(conn, &items)?;
    Ok(json!({ "ok": true }))
}

// Custom pages

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PageForm {
    id: Option<String>,
    title: String,
    icon: String,
    color: String,
    active: Option<bool>,
    order: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SectionForm {
    id: Option<String>,
    title: String,
    #[serde(rename = "type")]
    kind: SectionType,
    content: String,
    download_url: Option<String>,
    description: Option<String>,
}

fn pages_list(state: &AppState) -> HandlerResult {
    let user = require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let mut pages: Vec<CustomPage> = load(conn)?;
    if user.role != Role::Admin {
        pages.retain(|p| p.active);
    }
    sort_by_order(&mut pages, |p| p.order);
    Ok(json!({ "pages": to_json(&pages)? }))
}

fn pages_get(state: &AppState, params: &Value) -> HandlerResult {
    let user = require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let pages: Vec<CustomPage> = load(conn)?;
    match store::find_by_id(&pages, &id) {
        Some(p) if p.active || user.role == Role::Admin => Ok(json!({ "page": to_json(p)? })),
        _ => Err(HandlerErr::not_found("page not found")),
    }
}

fn pages_upsert(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let form: PageForm = parse_param(params, "page")?;
    if form.title.trim().is_empty() {
        return Err(HandlerErr::bad_params("missing title"));
    }
    let order = check_order(form.order)?;
    let mut pages: Vec<CustomPage> = load(conn)?;
    let existing = form
        .id
        .as_deref()
        .and_then(|id| store::find_by_id(&pages, id))
        .cloned();
    let page = CustomPage {
        id: existing
            .as_ref()
            .map(|p| p.id.clone())
            .unwrap_or_else(store::generate_id),
        title: form.title.trim().to_string(),
        icon: form.icon,
        color: form.color,
        active: form
            .active
            .or(existing.as_ref().map(|p| p.active))
            .unwrap_or(true),
        order: match order.or(existing.as_ref().map(|p| p.order)) {
            Some(o) => o,
            None => next_order(pages.iter().map(|p| p.order))?,
        },
        sections: existing
            .as_ref()
            .map(|p| p.sections.clone())
            .unwrap_or_default(),
    };
    if existing.is_some() {
        store::replace_by_id(&mut pages, page.clone());
    } else {
        pages.push(page.clone());
    }
    save(conn, &pages)?;
    Ok(json!({ "page": to_json(&page)?, "created": existing.is_none() }))
}

fn pages_delete(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let mut pages: Vec<CustomPage> = load(conn)?;
    if !store::remove_by_id(&mut pages, &id) {
        return Err(HandlerErr::not_found("page not found"));
    }
    save(conn, &pages)?;
    Ok(json!({ "ok": true }))
}

fn pages_upsert_section(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let page_id = get_required_str(params, "pageId")?;
    let form: SectionForm = parse_param(params, "section")?;
    if form.title.trim().is_empty() {
        return Err(HandlerErr::bad_params("missing title"));
    }

    let mut pages: Vec<CustomPage> = load(conn)?;
    let Some(page) = pages.iter_mut().find(|p| p.id == page_id) else {
        return Err(HandlerErr::not_found("page not found"));
    };
    let section = CustomPageSection {
        id: form.id.clone().unwrap_or_else(store::generate_id),
        title: form.title.trim().to_string(),
        kind: form.kind,
        content: form.content,
        download_url: form.download_url.filter(|u| !u.trim().is_empty()),
        description: form.description.filter(|d| !d.trim().is_empty()),
    };
    match page.sections.iter_mut().find(|s| s.id == section.id) {
        Some(slot) => *slot = section.clone(),
        None => page.sections.push(section.clone()),
    }
    save(conn, &pages)?;
    Ok(json!({ "section": to_json(&section)? }))
}

fn pages_delete_section(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let page_id = get_required_str(params, "pageId")?;
    let section_id = get_required_str(params, "sectionId")?;
    let mut pages: Vec<CustomPage> = load(conn)?;
    let Some(page) = pages.iter_mut().find(|p| p.id == page_id) else {
        return Err(HandlerErr::not_found("page not found"));
    };
    let before = page.sections.len();
    page.sections.retain(|s| s.id != section_id);
    if page.sections.len() == before {
        return Err(HandlerErr::not_found("section not found"));
    }
    save(conn, &pages)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let p = &req.params;
    let result = match req.method.as_str() {
        "sliders.list" => sliders_list(state),
        "sliders.create" => sliders_create(state, p),
        "sliders.update" => sliders_update(state, p),
        "sliders.delete" => sliders_delete(state, p),
        "sliders.move" => sliders_move(state, p),
        "blocks.list" => blocks_list(state),
        "blocks.upsert" => blocks_upsert(state, p),
        "blocks.delete" => blocks_delete(state, p),
        "pages.list" => pages_list(state),
        "pages.get" => pages_get(state, p),
        "pages.upsert" => pages_upsert(state, p),
        "pages.delete" => pages_delete(state, p),
        "pages.upsertSection" => pages_upsert_section(state, p),
        "pages.deleteSection" => pages_delete_section(state, p),
        _ => return None,
    };
    Some(respond(req, result))
}
