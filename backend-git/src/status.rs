use std::collections::HashMap;

use spp_core::{ItemPath, ItemState, WorkerError};

use crate::git_repo::GitRepo;

/// Переводит двухбуквенный код `git status --porcelain` в состояние элемента.
///
/// `x` описывает индекс, `y` описывает рабочую директорию.
pub fn classify(x: u8, y: u8) -> ItemState {
    match (x, y) {
        (b'?', b'?') => ItemState::NotTracked,
        (b'!', b'!') => ItemState::Ignored,
        (b'D', b'D') | (b'A', b'U') | (b'U', b'D') | (b'U', b'A') | (b'D', b'U') | (b'A', b'A')
        | (b'U', b'U') => ItemState::Conflicted,
        (b'A', _) | (_, b'A') => ItemState::Added,
        (b'D', _) => ItemState::Removed,
        (_, b'D') => ItemState::Missing,
        (b'M' | b'R' | b'C' | b'T', _) | (_, b'M' | b'T') => ItemState::Modified,
        _ => ItemState::Unknown,
    }
}

/// Разбирает вывод `git status --porcelain=v1 -z`.
///
/// Записи разделены NUL. У переименований и копий следом идет еще одно поле
/// со старым путем, его пропускаем.
pub fn parse_porcelain(output: &[u8]) -> Result<Vec<(ItemPath, ItemState)>, WorkerError> {
    let mut result = Vec::new();
    let mut fields = output.split(|b| *b == 0).filter(|f| !f.is_empty());

    while let Some(field) = fields.next() {
        if field.len() < 4 || field[2] != b' ' {
            return Err(WorkerError::Parse(format!(
                "bad status entry '{}'",
                String::from_utf8_lossy(field)
            )));
        }
        let (x, y) = (field[0], field[1]);
        let path = String::from_utf8_lossy(&field[3..]).into_owned();

        if matches!(x, b'R' | b'C') {
            fields.next();
        }

        result.push((ItemPath(path), classify(x, y)));
    }

    Ok(result)
}

/// Запрашивает статус путей (или всего репозитория, если список пуст).
///
/// Запрошенные пути, которых нет в выводе git, считаются `Unchanged`.
pub fn query_status(repo: &GitRepo, paths: &[ItemPath]) -> Result<Vec<(ItemPath, ItemState)>, WorkerError> {
    let mut args = vec!["status", "--porcelain=v1", "-z", "--ignored", "--untracked-files=all"];
    if !paths.is_empty() {
        args.push("--");
        args.extend(paths.iter().map(|p| p.as_str()));
    }

    let raw = repo.run_git_raw(&args)?;
    let reported: HashMap<ItemPath, ItemState> = parse_porcelain(&raw)?.into_iter().collect();

    let mut states: Vec<(ItemPath, ItemState)> = reported
        .iter()
        .map(|(p, s)| (p.clone(), *s))
        .collect();
    for path in paths {
        if !reported.contains_key(path) && !reported.keys().any(|r| is_inside(r, path)) {
            states.push((path.clone(), ItemState::Unchanged));
        }
    }
    states.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(states)
}

// запрошенная директория раскрывается git'ом в отдельные файлы
fn is_inside(reported: &ItemPath, dir: &ItemPath) -> bool {
    let dir = dir.as_str().trim_end_matches('/');
    reported
        .as_str()
        .strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}
