use crate::vfs::VirtualFileSet;
use colored::Colorize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::path::Path;
use std::rc::Rc;

/// Represents a node in the tree (either file or directory).
#[derive(Debug)]
struct TreeNode {
    name: String,
    children: Vec<Rc<RefCell<TreeNode>>>,
    is_file: bool,
}
impl TreeNode {
    fn new(name: String, is_file: bool) -> Self {
        Self {
            name,
            children: Vec::new(),
            is_file,
        }
    }
}

/// Build the directory tree from the file names, returning the root node.
/// Directories are implied by the names, so they are created on first sight.
fn build_tree(files: &VirtualFileSet, destination: &Path) -> Rc<RefCell<TreeNode>> {
    // create a root node to represent the 'destination' directory
    let root_name = destination
        .file_name()
        .map(|os| os.to_string_lossy().to_string())
        .unwrap_or_else(|| destination.display().to_string());

    let root = Rc::new(RefCell::new(TreeNode::new(root_name, false)));

    // map relative directory path to node
    let mut lookup: HashMap<String, Rc<RefCell<TreeNode>>> = HashMap::new();
    lookup.insert(String::new(), Rc::clone(&root));

    for file in files {
        let segments: Vec<&str> = file.name.split('/').collect();
        let mut parent = Rc::clone(&root);
        let mut key = String::new();

        for (index, segment) in segments.iter().enumerate() {
            let is_file = index == segments.len() - 1;

            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(segment);

            let node = match lookup.get(&key) {
                Some(node) if !is_file => Rc::clone(node),
                _ => {
                    let node = Rc::new(RefCell::new(TreeNode::new(segment.to_string(), is_file)));
                    parent.borrow_mut().children.push(Rc::clone(&node));

                    if !is_file {
                        lookup.insert(key.clone(), Rc::clone(&node));
                    }

                    node
                }
            };

            parent = node;
        }
    }

    root
}

/// Write the tree with a nice ASCII style.
fn write_tree(out: &mut String, node: &Rc<RefCell<TreeNode>>, prefix: &str, is_last: bool) {
    let node_borrow = node.borrow();

    let connector = if is_last {
        "└── ".yellow()
    } else {
        "├── ".yellow()
    };
    let name = if node_borrow.is_file {
        node_borrow.name.green()
    } else {
        node_borrow.name.blue()
    };
    let _ = writeln!(out, "{}{}{}", prefix.yellow(), connector, name);

    let child_prefix = if is_last {
        format!("{}    ", prefix)
    } else {
        format!("{}│   ", prefix)
    };

    let len = node_borrow.children.len();
    for (i, child) in node_borrow.children.iter().enumerate() {
        let last = i == len - 1;
        write_tree(out, child, &child_prefix, last);
    }
}

/// Renders the files as they would be laid out under `destination`.
pub fn render_tree(files: &VirtualFileSet, destination: &Path) -> String {
    let tree_root = build_tree(files, destination);

    let mut out = String::new();
    write_tree(&mut out, &tree_root, "", true);

    out
}

pub fn preview_as_tree(files: &VirtualFileSet, destination: &Path) {
    println!(
        "Legend: {} = (directory), {} = (file)",
        "blue".blue(),
        "green".green()
    );

    let fancy_prompt = format!(
        "{} {}\n",
        "┌─".bold().bright_blue(),
        "Preview".bold().bright_blue(),
    );

    println!("{}", fancy_prompt);

    print!("{}", render_tree(files, destination));

    let fancy_prompt = format!(
        "\n{} {} {}\n",
        "└─".bold().bright_blue(),
        files.len().to_string().bright_green(),
        "files would be written".bright_green()
    );

    println!("{}", fancy_prompt);
}
