//! User-facing reply and push texts.

use crate::store::ShoppingListItem;

pub const LIST_EMPTY: &str = "リストは空です";
pub const LIST_CLEARED: &str = "リストを空にしました";
pub const CANNOT_CLEAR_SHARED: &str = "共有リストのクリアはできません";
pub const CANNOT_SHARE_SHARED: &str = "共有リストは共有できません";
pub const NOT_SHARED: &str = "共有リストではありません";
pub const UNSHARED: &str = "共有を解除しました";
pub const SHARE_CONFIGURED: &str = "共有を設定しました";
pub const INVALID_CODE: &str = "有効でないコードです";
pub const REDEEM_WHILE_VIEWING: &str =
    "共有リストを使用（参照）中です\n解除するか他のリストを選択してください";
pub const REDEEM_WHILE_PUBLISHED: &str =
    "リストが共有（公開）されているため設定できません\n解除するか他のリストを選択してください";
pub const LIST_UPDATED: &str = "リストが更新されました";

pub const HELP: &str = "メッセージの送信でリストを作成します。コマンド以外は全てリストに追加されます。\n\
コマンド一覧：\n\
「リスト(list)」リストを表示します。\n\
「リスト番号」リストから指定番号のアイテムを削除します。\n\
（※コンマ／スペース区切りで複数指定できます。\
※削除されると番号がふりなおされます。）\n\
「クリア(clear)」リストを全削除します。\n\
「リスト１〜５」リストを切替えます。\n\
（※「リスト１　＜リスト名＞」でリスト名の設定ができます。）";

pub fn item_added(name: &str) -> String {
    format!("「{name}」を追加しました。")
}

pub fn item_deleted(name: &str) -> String {
    format!("「{name}」を削除しました")
}

pub fn item_not_found(number: i64) -> String {
    format!("#{number} はありません")
}

pub fn list_switched(number: i64, name: &str) -> String {
    if name.is_empty() {
        format!("「リスト{number}」に切替えました")
    } else {
        format!("「リスト{number}（{name}）」に切替えました")
    }
}

pub fn share_code_issued(code: &str) -> String {
    format!("リストを共有したい友達に、下記のコードを渡してください\n{code}")
}

/// Sent to the owner of the list that was being mirrored.
pub fn published_list_unshared(number: i64) -> String {
    format!("リスト{number}（公開中）の共有が解除されました")
}

/// Sent to the owner of a list that was mirroring.
pub fn referencing_list_unshared(number: i64) -> String {
    format!("リスト{number}（参照中）の共有が解除されました")
}

/// `#<number> <name>` per line, or [`LIST_EMPTY`].
pub fn format_items(items: &[ShoppingListItem]) -> String {
    if items.is_empty() {
        return LIST_EMPTY.to_string();
    }
    items
        .iter()
        .map(|i| format!("#{} {}", i.number, i.name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn list_updated(items: &[ShoppingListItem]) -> String {
    format!("{LIST_UPDATED}\n{}", format_items(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ListId;

    fn item(number: i64, name: &str) -> ShoppingListItem {
        ShoppingListItem {
            id: number,
            shopping_list_id: ListId(1),
            number,
            name: name.to_string(),
        }
    }

    #[test]
    fn formats_items_one_per_line() {
        let items = vec![item(1, "TEST1"), item(2, "TEST2")];
        assert_eq!(format_items(&items), "#1 TEST1\n#2 TEST2");
        assert_eq!(format_items(&[]), LIST_EMPTY);
    }

    #[test]
    fn switch_message_includes_name_only_when_set() {
        assert_eq!(list_switched(1, ""), "「リスト1」に切替えました");
        assert_eq!(list_switched(2, "TEST2"), "「リスト2（TEST2）」に切替えました");
    }

    #[test]
    fn update_notice_prefixes_listing() {
        assert_eq!(
            list_updated(&[item(1, "milk")]),
            "リストが更新されました\n#1 milk"
        );
        assert_eq!(list_updated(&[]), "リストが更新されました\nリストは空です");
    }

    #[test]
    fn help_text_is_multiline() {
        assert!(HELP.starts_with("メッセージの送信でリストを作成します。"));
        assert_eq!(HELP.lines().count(), 8);
    }
}
