// Per-workspace rows of icon controllers kept in step with the compositor's window list.
use std::collections::HashMap;

use log::debug;

use crate::icon_controller::{IconContext, IconController, WindowKey};

/// Windows on one workspace, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceWindows {
    pub name: String,
    pub windows: Vec<WindowKey>,
}

struct WorkspaceRow {
    name: String,
    icons: Vec<IconController>,
}

pub struct WorkspaceIcons {
    context: IconContext,
    rows: Vec<WorkspaceRow>,
}

impl WorkspaceIcons {
    pub fn new(context: IconContext) -> Self {
        Self {
            context,
            rows: Vec::new(),
        }
    }

    /// Rebuild rows from a fresh snapshot.
    ///
    /// A window still on the same workspace keeps its controller, so an open preview survives
    /// the refresh. Windows that closed or changed workspace have their controllers destroyed.
    pub fn sync(&mut self, workspaces: &[WorkspaceWindows]) {
        let mut previous: HashMap<(String, WindowKey), IconController> = HashMap::new();
        for row in self.rows.drain(..) {
            for icon in row.icons {
                previous.insert((row.name.clone(), icon.window().clone()), icon);
            }
        }

        let mut created = 0usize;
        let mut rows = Vec::with_capacity(workspaces.len());
        for workspace in workspaces {
            let mut icons = Vec::with_capacity(workspace.windows.len());
            for window in &workspace.windows {
                let key = (workspace.name.clone(), window.clone());
                let icon = match previous.remove(&key) {
                    Some(icon) => icon,
                    None => {
                        created += 1;
                        IconController::new(window.clone(), &self.context)
                    }
                };
                icons.push(icon);
            }
            rows.push(WorkspaceRow {
                name: workspace.name.clone(),
                icons,
            });
        }

        let removed = previous.len();
        // Dropping a controller destroys its preview machine.
        drop(previous);
        self.rows = rows;
        debug!(
            "workspace icons: {} workspaces, {} created, {} removed",
            self.rows.len(),
            created,
            removed
        );
    }

    /// Dismiss every preview; the visible workspace changed.
    pub fn workspace_changed(&self) {
        for icon in self.icons() {
            icon.workspace_changed();
        }
    }

    pub fn controller(&self, con_id: i64) -> Option<&IconController> {
        self.icons().find(|icon| icon.window().con_id == con_id)
    }

    pub fn workspace_of(&self, con_id: i64) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.icons.iter().any(|icon| icon.window().con_id == con_id))
            .map(|row| row.name.as_str())
    }

    pub fn icons(&self) -> impl Iterator<Item = &IconController> {
        self.rows.iter().flat_map(|row| row.icons.iter())
    }

    pub fn workspace_count(&self) -> usize {
        self.rows.len()
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(|row| row.icons.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
