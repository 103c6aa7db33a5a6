//! Interactive terminal front-end
//!
//! Walks the checklist, the defect form and the rectification list with
//! dialoguer prompts. All state changes go through `InspectionContext`.

use chrono::Utc;
use dialoguer::{Confirm, Input, Password, Select};
use pdi_common::{
    ChecklistItemState, DefectCategory, DefectForm, DefectLocation, Field, InspectionContext,
    MarkCanvas, RectificationEntry, RectificationTracker, Section, Severity,
};

use crate::api::User;
use crate::error::{PdiError, Result};

/// Size the reference images are laid out at in the terminal
pub const REFERENCE_WIDTH: f64 = 1000.0;
pub const REFERENCE_HEIGHT: f64 = 600.0;

fn status_marker(item: &ChecklistItemState) -> &'static str {
    if item.defect {
        "✘"
    } else if item.is_resolved() {
        "✔"
    } else if item.checked {
        // checked measurement item without a reading
        "…"
    } else {
        " "
    }
}

fn item_label(item: &ChecklistItemState) -> String {
    let mut label = format!("[{}] {}", status_marker(item), item.name);
    if let Some(value) = item.measurement_value {
        label.push_str(&format!(" ({:.1} V)", value));
    }
    if let Some(t) = item
        .defect_details
        .as_ref()
        .filter(|_| item.defect)
        .and_then(|d| d.defect_type.as_deref())
    {
        label.push_str(&format!(" - {}", t));
    }
    label
}

/// Section menu until the inspector is done. Returns whether the checklist is complete.
pub fn run_checklist(ctx: &mut InspectionContext) -> Result<bool> {
    loop {
        let Some(checklist) = ctx.checklist().checklist() else {
            return Err(pdi_common::Error::NoActiveChassis.into());
        };

        let mut entries: Vec<String> = checklist
            .iter()
            .map(|(section, items)| {
                let resolved = items.iter().filter(|i| i.is_resolved()).count();
                format!("{}. {} ({}/{})", section, section.title(), resolved, items.len())
            })
            .collect();
        let sections: Vec<Section> = checklist.keys().copied().collect();
        let (resolved, total) = ctx.checklist().progress();
        entries.push(format!("Done ({}/{})", resolved, total));

        let choice = Select::new()
            .with_prompt("Section")
            .items(&entries)
            .default(0)
            .interact()?;

        match sections.get(choice) {
            Some(section) => run_section(ctx, *section)?,
            None => {
                let complete = ctx.checklist().is_complete();
                if !complete {
                    print_pending(ctx);
                }
                return Ok(complete);
            }
        }
    }
}

fn print_pending(ctx: &InspectionContext) {
    let pending = ctx.checklist().pending_items();
    println!("{} item(s) still open:", pending.len());
    for item in pending.iter().take(10) {
        println!("  - {}. {}", item.section, item.name);
    }
    if pending.len() > 10 {
        println!("  ... and {} more", pending.len() - 10);
    }
}

fn run_section(ctx: &mut InspectionContext, section: Section) -> Result<()> {
    // section A documents are confirmed one by one
    let bulk = section != Section::A;

    loop {
        let items: Vec<ChecklistItemState> = ctx
            .checklist()
            .checklist()
            .and_then(|c| c.get(&section))
            .cloned()
            .unwrap_or_default();

        let mut entries: Vec<String> = items.iter().map(item_label).collect();
        if bulk {
            entries.push("Check all".into());
        }
        entries.push("Back".into());

        let choice = Select::new()
            .with_prompt(format!("{}. {}", section, section.title()))
            .items(&entries)
            .default(0)
            .interact()?;

        if let Some(item) = items.get(choice) {
            run_item(ctx, item)?;
        } else if bulk && choice == items.len() {
            skip_rejected(
                ctx.checklist_mut()
                    .toggle_check_all(section, true)
                    .map_err(PdiError::from),
            )?;
        } else {
            return Ok(());
        }
    }
}

fn run_item(ctx: &mut InspectionContext, item: &ChecklistItemState) -> Result<()> {
    let check_label = if item.requires_measurement() {
        "OK, enter reading"
    } else if item.checked {
        "Uncheck"
    } else {
        "OK"
    };
    let defect_label = if item.defect { "Edit defect" } else { "Defect" };
    let mut actions = vec![check_label, defect_label];
    if item.defect {
        actions.push("Clear defect");
    }
    actions.push("Cancel");

    let choice = Select::new()
        .with_prompt(&item.name)
        .items(&actions)
        .default(0)
        .interact()?;

    let outcome = match actions[choice] {
        "OK, enter reading" => {
            let value: f64 = Input::new()
                .with_prompt("Battery voltage")
                .validate_with(|v: &f64| -> std::result::Result<(), &'static str> {
                    if v.is_finite() {
                        Ok(())
                    } else {
                        Err("Enter a number")
                    }
                })
                .interact_text()?;
            ctx.checklist_mut()
                .set_item_value_and_check(item.section, item.id, value)
                .map_err(PdiError::from)
        }
        "OK" | "Uncheck" => ctx
            .checklist_mut()
            .toggle_check(item.section, item.id)
            .map_err(PdiError::from),
        "Defect" | "Edit defect" => run_defect(ctx, item),
        "Clear defect" => ctx
            .checklist_mut()
            .toggle_defect(item.section, item.id)
            .map_err(PdiError::from),
        _ => Ok(()),
    };
    skip_rejected(outcome)
}

/// A change the state engine refuses only cancels that one action
fn skip_rejected(outcome: Result<()>) -> Result<()> {
    match outcome {
        Err(PdiError::Common(e)) => {
            tracing::warn!(error = %e, "change rejected");
            println!("✘ {}", e);
            Ok(())
        }
        other => other,
    }
}

fn select_index<T: ToString>(prompt: &str, options: &[T], current: Option<usize>) -> Result<usize> {
    Ok(Select::new()
        .with_prompt(prompt)
        .items(options)
        .default(current.unwrap_or(0))
        .interact()?)
}

/// Defect form in disclosure order, then image marks
fn run_defect(ctx: &mut InspectionContext, item: &ChecklistItemState) -> Result<()> {
    let existing = item.defect_details.clone().unwrap_or_default();
    let mut form = DefectForm::from_details(&existing);
    if form.is_ready() && confirm("Change defect details?")? {
        form = DefectForm::new();
    }

    while let Some(field) = form.focus() {
        match field {
            Field::Category => {
                let current = existing
                    .category
                    .and_then(|c| DefectCategory::ALL.iter().position(|x| *x == c));
                let idx = select_index("Category", &DefectCategory::ALL, current)?;
                form.select_category(DefectCategory::ALL[idx]);
            }
            Field::Type => {
                let options = form.type_options();
                let idx = select_index("Type", options, None)?;
                form.select_type(options[idx])?;
            }
            Field::Location => {
                let idx = select_index("Location", &DefectLocation::ALL, None)?;
                form.select_location(DefectLocation::ALL[idx])?;
            }
            Field::Severity => {
                let idx = select_index("Severity", &Severity::ALL, None)?;
                form.select_severity(Severity::ALL[idx])?;
            }
            Field::Remarks => {
                let remarks: String = Input::new()
                    .with_prompt("Remarks (optional)")
                    .with_initial_text(existing.remarks.clone())
                    .allow_empty(true)
                    .interact_text()?;
                form.set_remarks(remarks)?;
                break;
            }
        }
    }

    ctx.commit_defect(item.section, item.id, &form)?;
    run_marks(ctx, item)
}

fn run_marks(ctx: &mut InspectionContext, item: &ChecklistItemState) -> Result<()> {
    let details = ctx
        .checklist()
        .item(item.section, item.id)
        .and_then(|i| i.defect_details.clone())
        .unwrap_or_default();
    let mut canvas = MarkCanvas::for_details(&details);
    canvas.measure(REFERENCE_WIDTH, REFERENCE_HEIGHT);

    loop {
        let visible = ctx
            .checklist()
            .item(item.section, item.id)
            .and_then(|i| i.defect_details.as_ref())
            .map(|d| canvas.visible_marks(d).len())
            .unwrap_or(0);

        let actions = ["Place mark", "Next image", "Previous image", "Done"];
        let choice = Select::new()
            .with_prompt(format!("{} ({} mark(s))", canvas.current_image(), visible))
            .items(&actions)
            .default(0)
            .interact()?;

        match choice {
            0 => {
                let raw: String = Input::new()
                    .with_prompt(format!(
                        "Position x,y within {}x{}",
                        REFERENCE_WIDTH, REFERENCE_HEIGHT
                    ))
                    .interact_text()?;
                let Some((x, y)) = parse_point(&raw) else {
                    println!("  Expected two numbers, e.g. 420,180");
                    continue;
                };
                match ctx.place_mark(item.section, item.id, &canvas, x, y)? {
                    Some(mark) => println!("  → ({:.3}, {:.3}) on {}", mark.nx, mark.ny, mark.image),
                    None => println!("  Outside the image, ignored"),
                }
            }
            1 | 2 => {
                if choice == 1 {
                    canvas.next_image();
                } else {
                    canvas.previous_image();
                }
                // the new image is laid out at the same size
                canvas.measure(REFERENCE_WIDTH, REFERENCE_HEIGHT);
            }
            _ => return Ok(()),
        }
    }
}

pub fn parse_point(raw: &str) -> Option<(f64, f64)> {
    let (x, y) = raw.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

pub fn choose_supervisor(users: &[User]) -> Result<&User> {
    if users.is_empty() {
        return Err(PdiError::NoSupervisors);
    }
    let names: Vec<&str> = users.iter().map(User::display_name).collect();
    let idx = Select::new()
        .with_prompt("Supervisor")
        .items(&names)
        .default(0)
        .interact()?;
    Ok(&users[idx])
}

pub fn ask_password(prompt: &str) -> Result<String> {
    Ok(Password::new().with_prompt(prompt).interact()?)
}

pub fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

/// Reports a failed step and asks whether to run it again.
/// Never offers a retry that cannot succeed, and declines when there is no terminal.
pub fn offer_retry(err: &PdiError) -> bool {
    eprintln!("✘ {}", err);
    err.is_retryable() && confirm("Retry?").unwrap_or(false)
}

/// Mark/unmark loop. Returns `true` when the user chose to submit with every item rectified.
pub fn run_rectification(tracker: &mut RectificationTracker) -> Result<bool> {
    loop {
        let numbered: Vec<(String, i64, bool)> = tracker
            .numbered()
            .into_iter()
            .map(|(no, item)| {
                let defect = item
                    .first_defect()
                    .map(|d| format!(" - {}", d.defect_type))
                    .unwrap_or_default();
                let marker = if item.rectified { "✔" } else { " " };
                (format!("[{}] {} {}{}", marker, no, item.name, defect), item.id, item.rectified)
            })
            .collect();

        let (done, total) = tracker.progress();
        let mut entries: Vec<String> = numbered.iter().map(|(label, _, _)| label.clone()).collect();
        entries.push(format!("Submit ({}/{})", done, total));
        entries.push("Quit".into());

        let choice = Select::new()
            .with_prompt("Rectification")
            .items(&entries)
            .default(0)
            .interact()?;

        if let Some((_, id, rectified)) = numbered.get(choice) {
            if *rectified {
                if confirm("Mark as not rectified?")? {
                    tracker.unmark_rectified(*id);
                }
            } else {
                let entry = ask_rectification_entry()?;
                tracker.mark_rectified(*id, entry);
            }
        } else if choice == numbered.len() {
            if tracker.all_rectified() {
                return Ok(true);
            }
            println!("{} item(s) still need rectification", total - done);
        } else {
            return Ok(false);
        }
    }
}

fn ask_rectification_entry() -> Result<RectificationEntry> {
    let name: String = Input::new().with_prompt("Rectified by").interact_text()?;
    let no: String = Input::new().with_prompt("Staff no").interact_text()?;
    let remark: String = Input::new()
        .with_prompt("Remark")
        .allow_empty(true)
        .interact_text()?;
    let closed = confirm("Close this item?")?;
    Ok(RectificationEntry {
        name,
        no,
        remark,
        date: Utc::now().format("%Y-%m-%d").to_string(),
        closed,
    })
}
