//! Exact completion: depth-first search over (student -> template) that
//! either places every student or proves it cannot.
//!
//! The search keeps its own frame stack, so depth is bounded by the number
//! of students rather than the call stack, and every step counts against
//! `backtrack_iteration_limit`.

use crate::catalog::Catalog;
use crate::individual::ClassAssignment;
use sched_core::ScheduleError;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};
use types::GaParams;

struct Frame {
    position: usize,
    options: Vec<usize>,
    next: usize,
    placed: Option<Placement>,
}

#[derive(Clone, Copy)]
struct Placement {
    template: usize,
    opened: bool,
}

struct Board<'a> {
    cat: &'a Catalog,
    members: Vec<BTreeSet<usize>>,
    teacher_slot: HashMap<(usize, usize), usize>,
    room_slot: HashMap<(usize, usize), usize>,
    teacher_classes: Vec<usize>,
    max_per_teacher: usize,
}

impl<'a> Board<'a> {
    fn new(cat: &'a Catalog, max_per_teacher: usize) -> Self {
        Self {
            cat,
            members: vec![BTreeSet::new(); cat.templates.len()],
            teacher_slot: HashMap::new(),
            room_slot: HashMap::new(),
            teacher_classes: vec![0; cat.teachers.len()],
            max_per_teacher,
        }
    }

    fn admits(&self, template: usize) -> bool {
        let key = &self.cat.template(template).key;
        let members = self.members[template].len();
        if members >= self.cat.capacity(template) {
            return false;
        }
        if members == 0 && self.teacher_classes[key.teacher] >= self.max_per_teacher {
            return false;
        }
        key.slots.iter().all(|&s| {
            self.teacher_slot.get(&(key.teacher, s)).map_or(true, |&t| t == template)
                && self.room_slot.get(&(key.room, s)).map_or(true, |&t| t == template)
        })
    }

    /// Admissible templates for `student`, fullest class first, then most
    /// demanded shape, then largest room.
    fn options(&self, student: usize) -> Vec<usize> {
        let mut opts: Vec<usize> = self.cat.student_templates[student]
            .iter()
            .copied()
            .filter(|&t| self.admits(t))
            .collect();
        opts.sort_by_key(|&t| {
            std::cmp::Reverse((
                self.members[t].len(),
                self.cat.template(t).candidates.len(),
                self.cat.capacity(t),
            ))
        });
        opts
    }

    fn place(&mut self, template: usize, student: usize) -> Placement {
        let opened = self.members[template].is_empty();
        self.members[template].insert(student);
        if opened {
            let key = &self.cat.template(template).key;
            self.teacher_classes[key.teacher] += 1;
            for &s in &key.slots {
                self.teacher_slot.insert((key.teacher, s), template);
                self.room_slot.insert((key.room, s), template);
            }
        }
        Placement { template, opened }
    }

    fn undo(&mut self, p: Placement, student: usize) {
        self.members[p.template].remove(&student);
        if p.opened {
            let key = &self.cat.template(p.template).key;
            self.teacher_classes[key.teacher] -= 1;
            for &s in &key.slots {
                self.teacher_slot.remove(&(key.teacher, s));
                self.room_slot.remove(&(key.room, s));
            }
        }
    }

    fn into_classes(self) -> Vec<ClassAssignment> {
        self.members
            .into_iter()
            .enumerate()
            .filter(|(_, m)| !m.is_empty())
            .map(|(template, students)| ClassAssignment { template, students })
            .collect()
    }
}

/// Places every student or fails with a named reason.
pub fn solve(cat: &Catalog, params: &GaParams) -> Result<Vec<ClassAssignment>, ScheduleError> {
    if let Some(s) = (0..cat.student_count()).find(|&s| cat.student_templates[s].is_empty()) {
        return Err(ScheduleError::StudentWithoutTemplates {
            enrollment: cat.students[s].id,
        });
    }

    let mut order: Vec<usize> = (0..cat.student_count()).collect();
    order.sort_by_key(|&s| cat.student_templates[s].len());

    let mut board = Board::new(cat, params.max_classes_per_teacher.max(1));
    let limit = params.backtrack_iteration_limit.max(1);
    let mut steps = 0usize;

    let mut stack = vec![Frame {
        position: 0,
        options: board.options(order[0]),
        next: 0,
        placed: None,
    }];

    loop {
        steps += 1;
        if steps > limit {
            debug!(steps, depth = stack.len(), "exact search hit its step limit");
            return Err(ScheduleError::BacktrackLimit { iterations: limit });
        }

        let Some(frame) = stack.last_mut() else {
            return Err(ScheduleError::Unsatisfiable);
        };
        let student = order[frame.position];
        if let Some(p) = frame.placed.take() {
            board.undo(p, student);
        }
        if frame.next >= frame.options.len() {
            stack.pop();
            continue;
        }

        let template = frame.options[frame.next];
        frame.next += 1;
        frame.placed = Some(board.place(template, student));

        let position = frame.position + 1;
        if position == order.len() {
            break;
        }
        let options = board.options(order[position]);
        stack.push(Frame {
            position,
            options,
            next: 0,
            placed: None,
        });
    }

    let classes = board.into_classes();
    info!(steps, classes = classes.len(), "exact search placed every student");
    Ok(classes)
}
