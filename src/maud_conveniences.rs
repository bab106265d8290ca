use crate::{auth::PermissionsTarget, data::user::User};
use maud::{Markup, Render, html};

pub fn render_table<const N: usize>(
    titles: [Markup; N],
    items: impl IntoIterator<Item = [Markup; N]>,
) -> Markup {
    html! {
        div class="overflow-x-auto" {
            table class="min-w-full bg-gray-800 rounded shadow-md" {
                thead class="bg-gray-700" {
                    tr {
                        @for title in titles {
                            th class="py-2 px-4 text-left font-semibold text-gray-300" {(title)}
                        }
                    }
                }
                tbody {
                    @for row in items {
                        tr {
                            @for col in row {
                                td class="py-2 px-4 border-b border-gray-600 text-gray-200" {(col)}
                            }
                        }
                    }
                }
            }
        }
    }
}

pub fn title(s: impl Render) -> Markup {
    html! {
        h1 class="text-2xl font-semibold mb-4" {(s)}
    }
}

pub fn subtitle(s: impl Render) -> Markup {
    html! {
        h2 class="text-xl font-semibold mb-2" {(s)}
    }
}

pub fn form_element(id: &str, label: &str, input: Markup) -> Markup {
    html! {
        div class="mb-4" {
            label for=(id) class="block text-sm font-bold mb-2 text-gray-300" {(label)}
            (input)
        }
    }
}

pub fn simple_form_element(
    id: &str,
    label: &str,
    required: bool,
    input_type: Option<&str>,
    value: Option<&str>,
) -> Markup {
    form_element(
        id,
        label,
        html! {
            input type=(input_type.unwrap_or("text")) id=(id) name=(id) required[required] value=[value] class="shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600" {}
        },
    )
}

pub fn form_submit_button(text: Option<&str>) -> Markup {
    html! {
        div class="flex items-center justify-between" {
            button type="submit" class="bg-blue-500 hover:bg-blue-700 font-bold py-2 px-4 rounded focus:outline-none focus:shadow-outline" {
                (text.unwrap_or("Submit"))
            }
        }
    }
}

pub fn errors_list(heading: Option<&str>, errors: impl IntoIterator<Item = impl Render>) -> Markup {
    html! {
        div class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded relative mb-4" role="alert" {
            @if let Some(heading) = heading {
                strong class="font-bold" {(heading)}
            }
            ul class="list-disc list-inside" {
                @for error in errors {
                    li {(error)}
                }
            }
        }
    }
}

pub fn success_banner(message: impl Render) -> Markup {
    html! {
        div class="bg-green-100 border border-green-400 text-green-800 px-4 py-3 rounded relative mb-4" role="status" {
            (message)
        }
    }
}

pub fn stat_card(label: &str, value: impl Render) -> Markup {
    html! {
        div class="bg-gray-800 rounded shadow-md p-4 text-center" {
            p class="text-sm text-gray-400" {(label)}
            p class="text-2xl font-semibold" {(value)}
        }
    }
}

pub fn render_nav(user: Option<&User>) -> Markup {
    let link = |href: &str, text: &str| {
        html! {
            a href=(href) class="text-gray-300 hover:bg-gray-700 hover:text-white px-3 py-2 rounded-md text-sm font-medium" {(text)}
        }
    };

    html! {
        nav class="bg-gray-800 p-4 w-full fixed top-0" {
            div class="container mx-auto flex items-center justify-between" {
                a href="/" class="text-white font-bold text-lg" {"Roster"}
                div class="flex space-x-4" {
                    @if let Some(user) = user {
                        (link("/students", "Students"))
                        @if user.get_permissions().intersects(PermissionsTarget::EXPORT_FILES | PermissionsTarget::IMPORT_FILES) {
                            (link("/import_export", "Import/Export"))
                        }
                        (link("/profile/password", "Change Password"))
                        form method="post" action="/logout" {
                            button type="submit" class="text-gray-300 hover:bg-gray-700 hover:text-white px-3 py-2 rounded-md text-sm font-medium" {
                                "Logout " (user.username)
                                @if user.is_admin() {
                                    " (admin)"
                                }
                            }
                        }
                    } @else {
                        (link("/login", "Login"))
                        (link("/register", "Register"))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_renders_every_cell() {
        let table = render_table(
            [html! {"Name"}, html! {"Age"}],
            vec![[html! {"Ada"}, html! {"36"}], [html! {"Alan"}, html! {"41"}]],
        )
        .into_string();

        assert_eq!(table.matches("<tr>").count(), 3);
        assert!(table.contains("<td class=\"py-2 px-4 border-b border-gray-600 text-gray-200\">Alan</td>"));
    }

    #[test]
    fn errors_are_escaped() {
        let list = errors_list(Some("Problems"), ["<script>"]).into_string();
        assert!(list.contains("&lt;script&gt;"));
        assert!(!list.contains("<script>"));
    }

    #[test]
    fn logged_out_nav_offers_login() {
        let nav = render_nav(None).into_string();
        assert!(nav.contains("href=\"/login\""));
        assert!(!nav.contains("/students"));
    }
}
